pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigLoader, ConfigUtils, RuntimeConfig};
pub use error::{EtlError, EtlResult};
pub use retry::{BackoffStrategy, RetryPolicy, Sleeper, TokioSleeper};
