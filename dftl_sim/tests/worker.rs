use aok::{OK, Void};
use dftl_sim::{
  NvmeCmd, NvmeRequest, SsdConf,
  conf::NAND_READ_LATENCY,
  ssd_spawn,
  worker::{NVME_CMD_DSM, NVME_CMD_READ, NVME_CMD_WRITE},
};
use log::info;

fn req(opcode: u8, cid: u16, slba: u64, stime: u64) -> NvmeRequest {
  NvmeRequest {
    cmd: NvmeCmd { opcode, cid },
    slba,
    nlb: 8,
    stime,
    reqlat: 0,
    expire_time: stime,
  }
}

#[test]
fn test_worker_rings() -> Void {
  let _ = simplelog::SimpleLogger::init(log::LevelFilter::Info, simplelog::Config::default());

  let ctrl = ssd_spawn(SsdConf::with_geometry(2, 2, 32, 8), 2)?;
  assert_eq!(ctrl.num_poller(), 2);

  // nothing moves before the data plane reports ready
  ctrl.submit(0, req(NVME_CMD_WRITE, 1, 0, 1_000_000_000))?;
  assert!(ctrl.poll_completion(0).is_none());
  ctrl.start();

  let done = ctrl.wait_completion(0)?;
  assert_eq!(done.cmd.cid, 1);
  assert!(done.reqlat > 0);
  assert_eq!(done.expire_time, 1_000_000_000 + done.reqlat);
  info!("write completed in {} ns", done.reqlat);

  // ring 1 reads back what ring 0 wrote
  ctrl.submit(1, req(NVME_CMD_READ, 2, 0, 2_000_000_000))?;
  let done = ctrl.wait_completion(1)?;
  assert_eq!(done.cmd.cid, 2);
  assert_eq!(done.reqlat, NAND_READ_LATENCY);

  // DSM is a no-op
  ctrl.submit(0, req(NVME_CMD_DSM, 3, 0, 3_000_000_000))?;
  let done = ctrl.wait_completion(0)?;
  assert_eq!(done.reqlat, 0);

  // unknown opcodes complete untimed
  ctrl.submit(1, req(0x7f, 4, 0, 4_000_000_000))?;
  let done = ctrl.wait_completion(1)?;
  assert_eq!(done.cmd.cid, 4);
  assert_eq!(done.reqlat, 0);

  drop(ctrl);
  OK
}

#[test]
fn test_worker_many_requests_in_order() -> Void {
  let ctrl = ssd_spawn(SsdConf::with_geometry(2, 2, 32, 8), 1)?;
  ctrl.start();

  let mut t = 1_000_000_000u64;
  for i in 0..64u16 {
    ctrl.submit(0, req(NVME_CMD_WRITE, i, (i as u64) * 8, t))?;
    t += 1_000_000;
  }
  // same-ring completions come back in submission order
  for i in 0..64u16 {
    let done = ctrl.wait_completion(0)?;
    assert_eq!(done.cmd.cid, i);
    assert!(done.reqlat > 0);
  }
  OK
}
