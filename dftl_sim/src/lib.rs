pub mod conf;
pub mod error;
pub mod ssd;
pub mod worker;

pub use conf::SsdConf;
pub use error::{Error, Result};
pub use ssd::Ssd;
pub use worker::{NvmeCmd, NvmeRequest, SsdCtrl, ssd_spawn};
