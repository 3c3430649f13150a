use thiserror::Error;

/// Result alias for the simulator's fallible front-end surface.
/// 模拟器前端可失败接口的 Result 别名。
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the device front-end can observe. Bookkeeping violations inside
/// the FTL (counter drift, exhausted pools) abort the simulation instead of
/// reporting here; see the assertions along the write and GC paths.
/// 设备前端可能观察到的错误。FTL 内部的账目异常（计数漂移、资源池耗尽）
/// 会直接中止模拟而不在此上报，见写路径与回收路径上的断言。
#[derive(Error, Debug)]
pub enum Error {
  /// A submission or completion ring was closed on the other side.
  /// 提交或完成环的另一端已关闭。
  #[error("Ring closed")]
  RingClosed,
  /// IO Error while spawning the worker.
  /// 启动工作线程时的 IO 错误。
  #[error("IO Error: {0}")]
  Io(#[from] std::io::Error),
}
