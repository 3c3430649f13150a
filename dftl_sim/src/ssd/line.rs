use crate::ssd::{Ssd, addr::Ppa, nand::PgStatus};

const NIL: u32 = u32::MAX;

/// Which allocation stream a line currently serves.
/// 该 line 当前服务于哪条分配流。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
  None,
  Data,
  Trans,
}

/// A super-block spanning the same block index across every LUN of every
/// channel.
/// 横跨所有通道所有 LUN 上同一块号的超级块。
pub struct Line {
  pub id: usize,
  pub ipc: usize,
  pub vpc: usize,
  /// 1-based slot in the victim heap, zero while not queued.
  /// 在待回收堆中的槽位（从 1 起），未入堆时为零。
  pub pos: usize,
  pub kind: LineKind,
  prev: u32,
  next: u32,
}

/// Line bookkeeping: the free and full FIFO lists threaded through the line
/// pool, and a position-tracking min-heap of victim candidates keyed by
/// valid-page count.
/// line 管理：穿过 line 池的空闲与写满 FIFO 链，以及按有效页数排序、
/// 记录槽位的待回收最小堆。
pub struct LineMgr {
  pub lines: Vec<Line>,
  pub tt_lines: usize,
  pub free_line_cnt: usize,
  pub victim_line_cnt: usize,
  pub full_line_cnt: usize,
  free_head: u32,
  free_tail: u32,
  full_head: u32,
  full_tail: u32,
  /// Slot 0 stays unused so a zero pos means "absent".
  /// 槽位 0 不用，pos 为零即表示不在堆中。
  pq: Vec<u32>,
}

fn list_push_tail(lines: &mut [Line], head: &mut u32, tail: &mut u32, id: u32) {
  {
    let e = &mut lines[id as usize];
    e.prev = *tail;
    e.next = NIL;
  }
  if *tail != NIL {
    lines[*tail as usize].next = id;
  } else {
    *head = id;
  }
  *tail = id;
}

fn list_pop_head(lines: &mut [Line], head: &mut u32, tail: &mut u32) -> Option<u32> {
  let h = *head;
  if h == NIL {
    return None;
  }
  let next = lines[h as usize].next;
  *head = next;
  if next != NIL {
    lines[next as usize].prev = NIL;
  } else {
    *tail = NIL;
  }
  let e = &mut lines[h as usize];
  e.prev = NIL;
  e.next = NIL;
  Some(h)
}

fn list_remove(lines: &mut [Line], head: &mut u32, tail: &mut u32, id: u32) {
  let (prev, next) = {
    let e = &lines[id as usize];
    (e.prev, e.next)
  };
  if prev != NIL {
    lines[prev as usize].next = next;
  } else {
    *head = next;
  }
  if next != NIL {
    lines[next as usize].prev = prev;
  } else {
    *tail = prev;
  }
  let e = &mut lines[id as usize];
  e.prev = NIL;
  e.next = NIL;
}

fn list_ids(lines: &[Line], head: u32) -> Vec<usize> {
  let mut out = Vec::new();
  let mut cur = head;
  while cur != NIL {
    out.push(cur as usize);
    cur = lines[cur as usize].next;
  }
  out
}

impl LineMgr {
  pub fn new(tt_lines: usize) -> Self {
    let lines = (0..tt_lines)
      .map(|id| Line {
        id,
        ipc: 0,
        vpc: 0,
        pos: 0,
        kind: LineKind::None,
        prev: NIL,
        next: NIL,
      })
      .collect();
    let mut lm = LineMgr {
      lines,
      tt_lines,
      free_line_cnt: 0,
      victim_line_cnt: 0,
      full_line_cnt: 0,
      free_head: NIL,
      free_tail: NIL,
      full_head: NIL,
      full_tail: NIL,
      pq: vec![NIL],
    };
    for id in 0..tt_lines as u32 {
      lm.push_free(id as usize);
    }
    debug_assert_eq!(lm.free_line_cnt, lm.tt_lines);
    lm
  }

  pub fn pop_free(&mut self) -> Option<usize> {
    let Self {
      lines,
      free_head,
      free_tail,
      ..
    } = self;
    let id = list_pop_head(lines, free_head, free_tail)?;
    self.free_line_cnt -= 1;
    Some(id as usize)
  }

  pub fn push_free(&mut self, id: usize) {
    let Self {
      lines,
      free_head,
      free_tail,
      ..
    } = self;
    list_push_tail(lines, free_head, free_tail, id as u32);
    self.free_line_cnt += 1;
  }

  pub fn push_full(&mut self, id: usize) {
    let Self {
      lines,
      full_head,
      full_tail,
      ..
    } = self;
    list_push_tail(lines, full_head, full_tail, id as u32);
    self.full_line_cnt += 1;
  }

  pub fn remove_full(&mut self, id: usize) {
    let Self {
      lines,
      full_head,
      full_tail,
      ..
    } = self;
    list_remove(lines, full_head, full_tail, id as u32);
    self.full_line_cnt -= 1;
  }

  pub fn free_ids(&self) -> Vec<usize> {
    list_ids(&self.lines, self.free_head)
  }

  pub fn full_ids(&self) -> Vec<usize> {
    list_ids(&self.lines, self.full_head)
  }

  /// Queued victim candidates in heap-array order.
  /// 堆数组顺序的待回收候选。
  pub fn victim_ids(&self) -> &[u32] {
    &self.pq[1..]
  }

  pub fn pq_insert(&mut self, id: usize) {
    debug_assert_eq!(self.lines[id].pos, 0);
    self.pq.push(id as u32);
    let slot = self.pq.len() - 1;
    self.lines[id].pos = slot;
    self.sift_up(slot);
    self.victim_line_cnt += 1;
  }

  pub fn pq_peek(&self) -> Option<usize> {
    if self.pq.len() > 1 {
      Some(self.pq[1] as usize)
    } else {
      None
    }
  }

  /// Pop the minimum-vpc line. The popped line keeps a stale pos; the
  /// caller zeroes it.
  /// 弹出 vpc 最小的 line。弹出者的 pos 残留旧值，由调用方清零。
  pub fn pq_pop(&mut self) -> Option<usize> {
    if self.pq.len() <= 1 {
      return None;
    }
    let top = self.pq[1] as usize;
    let last = self.pq[self.pq.len() - 1];
    self.pq.pop();
    if self.pq.len() > 1 {
      self.pq[1] = last;
      self.lines[last as usize].pos = 1;
      self.sift_down(1);
    }
    self.victim_line_cnt -= 1;
    Some(top)
  }

  /// Re-key a queued line in place. Stores the new vpc, then restores the
  /// heap around its slot.
  /// 原地调整已入堆 line 的键。先写入新 vpc，再围绕其槽位恢复堆序。
  pub fn pq_change_priority(&mut self, id: usize, new_vpc: usize) {
    let slot = self.lines[id].pos;
    debug_assert!(slot != 0 && self.pq[slot] as usize == id);
    self.lines[id].vpc = new_vpc;
    self.sift_up(slot);
    self.sift_down(self.lines[id].pos);
  }

  fn sift_up(&mut self, mut slot: usize) {
    while slot > 1 {
      let parent = slot / 2;
      let a = self.pq[slot] as usize;
      let b = self.pq[parent] as usize;
      if self.lines[a].vpc >= self.lines[b].vpc {
        break;
      }
      self.pq.swap(slot, parent);
      self.lines[a].pos = parent;
      self.lines[b].pos = slot;
      slot = parent;
    }
  }

  fn sift_down(&mut self, mut slot: usize) {
    let len = self.pq.len() - 1;
    loop {
      let mut child = slot * 2;
      if child > len {
        break;
      }
      if child + 1 <= len {
        let l = self.pq[child] as usize;
        let r = self.pq[child + 1] as usize;
        if self.lines[r].vpc < self.lines[l].vpc {
          child += 1;
        }
      }
      let a = self.pq[slot] as usize;
      let c = self.pq[child] as usize;
      if self.lines[a].vpc <= self.lines[c].vpc {
        break;
      }
      self.pq.swap(slot, child);
      self.lines[a].pos = child;
      self.lines[c].pos = slot;
      slot = child;
    }
  }
}

impl Ssd {
  #[inline(always)]
  pub fn get_line(&self, ppa: Ppa) -> &Line {
    &self.lm.lines[ppa.blk()]
  }

  /// Flip one page FREE -> VALID and bump the owning block and line.
  /// 将一页由 FREE 置为 VALID，并递增所在块与 line 的计数。
  pub fn mark_page_valid(&mut self, ppa: Ppa) {
    let pgs_per_blk = self.sp.pgs_per_blk;
    let pgs_per_line = self.sp.pgs_per_line;

    {
      let pg = self.get_pg_mut(ppa);
      debug_assert_eq!(pg.status, PgStatus::Free);
      pg.status = PgStatus::Valid;
    }
    {
      let blk = self.get_blk_mut(ppa);
      debug_assert!(blk.vpc < pgs_per_blk);
      blk.vpc += 1;
    }
    let line = &mut self.lm.lines[ppa.blk()];
    debug_assert!(line.vpc < pgs_per_line);
    line.vpc += 1;
  }

  /// Flip one page VALID -> INVALID, bump invalid counters, and re-key or
  /// re-home the owning line.
  /// 将一页由 VALID 置为 INVALID，递增无效计数，并调整所在 line 的
  /// 键值或归属。
  pub fn mark_page_invalid(&mut self, ppa: Ppa) {
    let pgs_per_blk = self.sp.pgs_per_blk;
    let pgs_per_line = self.sp.pgs_per_line;

    {
      let pg = self.get_pg_mut(ppa);
      debug_assert_eq!(pg.status, PgStatus::Valid);
      pg.status = PgStatus::Invalid;
    }
    {
      let blk = self.get_blk_mut(ppa);
      debug_assert!(blk.ipc < pgs_per_blk);
      blk.ipc += 1;
      debug_assert!(blk.vpc > 0 && blk.vpc <= pgs_per_blk);
      blk.vpc -= 1;
    }

    let id = ppa.blk();
    let lm = &mut self.lm;
    let was_full_line = lm.lines[id].vpc == pgs_per_line;
    debug_assert!(!was_full_line || lm.lines[id].ipc == 0);
    debug_assert!(lm.lines[id].ipc < pgs_per_line);
    lm.lines[id].ipc += 1;
    debug_assert!(lm.lines[id].vpc > 0 && lm.lines[id].vpc <= pgs_per_line);
    if lm.lines[id].pos != 0 {
      // adjust the victim slot in place under over-writes
      let new_vpc = lm.lines[id].vpc - 1;
      lm.pq_change_priority(id, new_vpc);
    } else {
      lm.lines[id].vpc -= 1;
    }

    if was_full_line {
      lm.remove_full(id);
      lm.pq_insert(id);
    }
  }

  /// Reset every page of the block to FREE and charge one erase cycle.
  /// 将块内所有页重置为 FREE 并记一次擦除。
  pub fn mark_block_free(&mut self, ppa: Ppa) {
    let pgs_per_blk = self.sp.pgs_per_blk;
    let secs_per_pg = self.sp.secs_per_pg;
    let blk = self.get_blk_mut(ppa);
    debug_assert_eq!(blk.pg.len(), pgs_per_blk);
    for pg in blk.pg.iter_mut() {
      debug_assert_eq!(pg.sec.len(), secs_per_pg);
      pg.status = PgStatus::Free;
    }
    blk.ipc = 0;
    blk.vpc = 0;
    blk.erase_cnt += 1;
    self.stat.blk_er_cnt += 1;
  }

  /// Retire a cleaned line back to the tail of the free list.
  /// 把清理完毕的 line 送回空闲链尾部。
  pub fn mark_line_free(&mut self, id: usize) {
    let line = &mut self.lm.lines[id];
    line.ipc = 0;
    line.vpc = 0;
    line.kind = LineKind::None;
    self.lm.push_free(id);
  }
}
