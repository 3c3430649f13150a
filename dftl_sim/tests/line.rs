use dftl_sim::ssd::line::{LineKind, LineMgr};

#[test]
fn test_free_list_fifo() {
  let mut lm = LineMgr::new(6);
  assert_eq!(lm.free_line_cnt, 6);
  assert_eq!(lm.free_ids(), vec![0, 1, 2, 3, 4, 5]);

  assert_eq!(lm.pop_free(), Some(0));
  assert_eq!(lm.pop_free(), Some(1));
  lm.push_free(0);
  assert_eq!(lm.free_ids(), vec![2, 3, 4, 5, 0]);
  assert_eq!(lm.free_line_cnt, 5);
  for line in lm.lines.iter() {
    assert_eq!(line.kind, LineKind::None);
  }
}

#[test]
fn test_full_list_mid_removal() {
  let mut lm = LineMgr::new(6);
  lm.push_full(1);
  lm.push_full(3);
  lm.push_full(5);
  assert_eq!(lm.full_ids(), vec![1, 3, 5]);

  lm.remove_full(3);
  assert_eq!(lm.full_ids(), vec![1, 5]);
  lm.remove_full(1);
  lm.remove_full(5);
  assert_eq!(lm.full_line_cnt, 0);
  assert!(lm.full_ids().is_empty());
}

#[test]
fn test_victim_heap_orders_by_vpc() {
  let mut lm = LineMgr::new(8);
  let vpcs = [9usize, 3, 7, 1, 5];
  for (id, &vpc) in vpcs.iter().enumerate() {
    lm.lines[id].vpc = vpc;
    lm.pq_insert(id);
  }
  assert_eq!(lm.victim_line_cnt, 5);
  assert_eq!(lm.pq_peek(), Some(3));

  let mut popped = Vec::new();
  while let Some(id) = lm.pq_pop() {
    lm.lines[id].pos = 0;
    popped.push(lm.lines[id].vpc);
  }
  assert_eq!(popped, vec![1, 3, 5, 7, 9]);
  assert_eq!(lm.victim_line_cnt, 0);
}

#[test]
fn test_victim_heap_change_priority() {
  let mut lm = LineMgr::new(8);
  for id in 0..4 {
    lm.lines[id].vpc = 10 + id;
    lm.pq_insert(id);
  }
  assert_eq!(lm.pq_peek(), Some(0));

  // decrease-key lifts line 3 to the top and stores the new vpc
  lm.pq_change_priority(3, 2);
  assert_eq!(lm.lines[3].vpc, 2);
  assert_eq!(lm.pq_peek(), Some(3));
  assert_eq!(lm.lines[3].pos, 1);

  // positions stay in sync with the heap array
  for (i, &id) in lm.victim_ids().iter().enumerate() {
    assert_eq!(lm.lines[id as usize].pos, i + 1);
  }
}

#[test]
fn test_victim_heap_fuzz() {
  let mut rng = fastrand::Rng::with_seed(42);
  let n = 64;
  let mut lm = LineMgr::new(n);
  for id in 0..n {
    lm.lines[id].vpc = rng.usize(0..512);
    lm.pq_insert(id);
  }

  // random re-keys, checking position bookkeeping as we go
  for _ in 0..256 {
    let id = rng.usize(0..n);
    lm.pq_change_priority(id, rng.usize(0..512));
    for (i, &qid) in lm.victim_ids().iter().enumerate() {
      assert_eq!(lm.lines[qid as usize].pos, i + 1);
    }
  }

  let mut last = 0;
  while let Some(id) = lm.pq_pop() {
    lm.lines[id].pos = 0;
    let vpc = lm.lines[id].vpc;
    assert!(vpc >= last, "heap popped out of order");
    last = vpc;
  }
}
