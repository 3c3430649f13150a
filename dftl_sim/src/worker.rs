use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread::{self, JoinHandle},
  time::Duration,
};

use log::error;

use crate::{
  conf::SsdConf,
  error::{Error, Result},
  ssd::Ssd,
};

pub const NVME_CMD_WRITE: u8 = 0x01;
pub const NVME_CMD_READ: u8 = 0x02;
pub const NVME_CMD_DSM: u8 = 0x09;

/// Command envelope as handed over by the device front-end.
/// 设备前端交付的命令封装。
#[derive(Debug, Clone, Copy, Default)]
pub struct NvmeCmd {
  pub opcode: u8,
  pub cid: u16,
}

/// One request flowing through a submission ring and back on a completion
/// ring. The worker fills `reqlat` and advances `expire_time`.
/// 流经提交环并从完成环返回的单个请求。工作线程填写 `reqlat` 并推进
/// `expire_time`。
#[derive(Debug, Clone, Default)]
pub struct NvmeRequest {
  pub cmd: NvmeCmd,
  /// Starting sector LBA.
  /// 起始扇区 LBA。
  pub slba: u64,
  /// Sector count.
  /// 扇区数。
  pub nlb: u32,
  /// Submission timestamp in ns, zero for "now".
  /// 提交时间戳（纳秒），零表示“当前时刻”。
  pub stime: u64,
  pub reqlat: u64,
  pub expire_time: u64,
}

type Ring = NvmeRequest;

/// Front-end handle over the FTL worker: per-poller submission and
/// completion rings plus the data-plane readiness flag.
/// 面向前端的 FTL 工作线程句柄：按 poller 划分的提交与完成环，外加
/// 数据面就绪标志。
pub struct SsdCtrl {
  to_ftl: Vec<crossfire::Tx<Ring>>,
  to_poller: Vec<crossfire::Rx<Ring>>,
  started: Arc<AtomicBool>,
  worker: Option<JoinHandle<()>>,
}

/// Build the device state, wire up `num_poller` ring pairs and spawn the
/// worker thread. The worker idles until [`SsdCtrl::start`].
/// 构建设备状态，接好 `num_poller` 对环并启动工作线程。线程空转等待
/// [`SsdCtrl::start`]。
pub fn ssd_spawn(sp: SsdConf, num_poller: usize) -> Result<SsdCtrl> {
  let mut to_ftl = Vec::with_capacity(num_poller);
  let mut sub_rx = Vec::with_capacity(num_poller);
  let mut comp_tx = Vec::with_capacity(num_poller);
  let mut to_poller = Vec::with_capacity(num_poller);
  for _ in 0..num_poller {
    let (tx, rx) = crossfire::spsc::unbounded_blocking();
    to_ftl.push(tx);
    sub_rx.push(rx);
    let (tx, rx) = crossfire::spsc::unbounded_blocking();
    comp_tx.push(tx);
    to_poller.push(rx);
  }

  let started = Arc::new(AtomicBool::new(false));
  let flag = started.clone();
  let ssd = Ssd::new(sp);
  let worker = thread::Builder::new()
    .name("ftl".into())
    .spawn(move || run_ftl(ssd, flag, sub_rx, comp_tx))?;

  Ok(SsdCtrl {
    to_ftl,
    to_poller,
    started,
    worker: Some(worker),
  })
}

impl SsdCtrl {
  /// Signal that the data plane is up; the worker starts draining rings.
  /// 宣告数据面就绪；工作线程开始排空各环。
  pub fn start(&self) {
    self.started.store(true, Ordering::Release);
  }

  pub fn num_poller(&self) -> usize {
    self.to_ftl.len()
  }

  pub fn submit(&self, ring: usize, req: NvmeRequest) -> Result<()> {
    self.to_ftl[ring].send(req).map_err(|_| Error::RingClosed)
  }

  pub fn poll_completion(&self, ring: usize) -> Option<NvmeRequest> {
    self.to_poller[ring].try_recv().ok()
  }

  pub fn wait_completion(&self, ring: usize) -> Result<NvmeRequest> {
    self.to_poller[ring].recv().map_err(|_| Error::RingClosed)
  }
}

impl Drop for SsdCtrl {
  fn drop(&mut self) {
    // closing every submission ring is the shutdown signal
    self.to_ftl.clear();
    self.started.store(true, Ordering::Release);
    if let Some(worker) = self.worker.take() {
      let _ = worker.join();
    }
  }
}

/// The FTL worker: the sole owner of the device state. Visits each live
/// ring, takes one request, dispatches it, stamps the latency onto the
/// completion, and runs a background GC round when free lines run low.
/// Exits once every submission ring is gone.
/// FTL 工作线程：设备状态的唯一持有者。轮询每个存活的环，取一个请求，
/// 分发执行，把延迟盖到完成项上；空闲 line 偏少时做一轮后台回收。
/// 所有提交环关闭后退出。
fn run_ftl(
  mut ssd: Ssd,
  started: Arc<AtomicBool>,
  sub_rx: Vec<crossfire::Rx<Ring>>,
  comp_tx: Vec<crossfire::Tx<Ring>>,
) {
  while !started.load(Ordering::Acquire) {
    thread::sleep(Duration::from_millis(100));
  }

  let mut live = vec![true; sub_rx.len()];
  loop {
    let mut any_live = false;
    for (i, sub) in sub_rx.iter().enumerate() {
      if !live[i] {
        continue;
      }
      any_live = true;
      let mut req = match sub.try_recv() {
        Ok(req) => req,
        Err(crossfire::TryRecvError::Empty) => continue,
        Err(crossfire::TryRecvError::Disconnected) => {
          live[i] = false;
          continue;
        }
      };

      let lat = match req.cmd.opcode {
        NVME_CMD_WRITE => ssd.write(req.slba, req.nlb, req.stime),
        NVME_CMD_READ => ssd.read(req.slba, req.nlb, req.stime),
        NVME_CMD_DSM => 0,
        // unknown opcodes pass through untimed
        _ => 0,
      };

      req.reqlat = lat;
      req.expire_time = req.expire_time.wrapping_add(lat);
      if comp_tx[i].send(req).is_err() {
        error!("FTL to_poller enqueue failed");
      }

      // clean one line if needed (in the background)
      if ssd.should_gc() {
        ssd.do_gc(false);
      }
    }
    if !any_live {
      break;
    }
  }
}
