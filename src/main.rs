// health-etl - Service Health Metrics ETL

use health_etl::app::run;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("✗ health-etl exited with error: {e}");
        std::process::exit(1);
    }
}
