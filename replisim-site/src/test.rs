use crate::{ReadOutcome, SiteStore, Status, Version};
use replisim_base::{Result, SiteId, Timestamp, TxnId, VarId};
use replisim_lang::TxnKind::{ReadOnly, ReadWrite};
use test_log::test;

const T1: TxnId = TxnId(1);
const T2: TxnId = TxnId(2);
const T3: TxnId = TxnId(3);

fn site() -> SiteStore {
    // Site 2 in the default layout: x1, x11 and every even variable.
    let vars = (1..=20).map(VarId).filter(|v| v.is_replicated() || v.0 % 10 == 1);
    SiteStore::new(SiteId(2), vars)
}

fn found(value: i64, at: u64) -> ReadOutcome {
    ReadOutcome::Found(Version {
        value,
        commit_time: Timestamp(at),
    })
}

#[test]
fn test_initial_contents() {
    let s = site();
    let map = s.data_map();
    assert_eq!(map.len(), 12);
    assert_eq!(map.get(&VarId(1)), Some(&10));
    assert_eq!(map.get(&VarId(20)), Some(&200));
    assert_eq!(s.dump(VarId(3)), None);
}

#[test]
fn test_write_excludes_other_holders() -> Result<()> {
    let mut s = site();
    assert!(s.is_writable(T1, VarId(2)));
    s.write(T1, VarId(2), 5)?;
    assert!(s.is_writable(T1, VarId(2)));
    assert!(!s.is_writable(T2, VarId(2)));
    assert_eq!(s.conflicting_transactions(T2, VarId(2)).into_iter().collect::<Vec<_>>(), vec![T1]);
    assert!(s.conflicting_transactions(T1, VarId(2)).is_empty());
    assert!(s.write(T2, VarId(2), 6).is_err());
    assert_eq!(s.pending_writer(VarId(2)), Some(T1));
    Ok(())
}

#[test]
fn test_read_marks_block_writers() -> Result<()> {
    let mut s = site();
    assert_eq!(s.read(T1, ReadWrite, Timestamp(1), VarId(4))?, found(40, 0));
    assert_eq!(s.read(T2, ReadWrite, Timestamp(2), VarId(4))?, found(40, 0));
    assert!(!s.is_writable(T1, VarId(4)));
    assert_eq!(
        s.conflicting_transactions(T3, VarId(4)).into_iter().collect::<Vec<_>>(),
        vec![T1, T2]
    );
    s.commit(T2, Timestamp(3));
    assert!(s.is_writable(T1, VarId(4)));
    Ok(())
}

#[test]
fn test_read_write_sees_conflict_but_read_only_does_not() -> Result<()> {
    let mut s = site();
    s.write(T1, VarId(6), 66)?;
    assert_eq!(s.read(T2, ReadWrite, Timestamp(2), VarId(6))?, ReadOutcome::Conflict(T1));
    assert_eq!(s.read(T3, ReadOnly, Timestamp(2), VarId(6))?, found(60, 0));
    // The conflicting read took no hold.
    assert!(!s.involves(T2));
    Ok(())
}

#[test]
fn test_commit_and_snapshot_reads() -> Result<()> {
    let mut s = site();
    s.write(T1, VarId(8), 81)?;
    s.commit(T1, Timestamp(3));
    s.write(T2, VarId(8), 82)?;
    s.commit(T2, Timestamp(6));
    assert_eq!(s.version_count(VarId(8)), 3);
    assert_eq!(s.read(T3, ReadOnly, Timestamp(2), VarId(8))?, found(80, 0));
    assert_eq!(s.read(T3, ReadOnly, Timestamp(3), VarId(8))?, found(81, 3));
    assert_eq!(s.read(T3, ReadOnly, Timestamp(5), VarId(8))?, found(81, 3));
    assert_eq!(s.read(T3, ReadOnly, Timestamp(9), VarId(8))?, found(82, 6));
    assert_eq!(s.dump(VarId(8)), Some(82));

    s.clear_old_versions();
    assert_eq!(s.version_count(VarId(8)), 1);
    assert_eq!(s.version_count(VarId(2)), 1);
    assert_eq!(s.dump(VarId(8)), Some(82));
    Ok(())
}

#[test]
fn test_abort_discards_holds_only() -> Result<()> {
    let mut s = site();
    s.write(T1, VarId(10), 1)?;
    s.read(T1, ReadWrite, Timestamp(1), VarId(12))?;
    assert!(s.involves(T1));
    s.abort(T1);
    assert!(!s.involves(T1));
    assert_eq!(s.dump(VarId(10)), Some(100));
    assert!(s.accessed_transactions().contains(&T1));
    Ok(())
}

#[test]
fn test_fail_loses_uncommitted_work() -> Result<()> {
    let mut s = site();
    s.write(T1, VarId(2), 1)?;
    s.fail(Timestamp(2));
    assert_eq!(s.status(), Status::Down);
    assert!(s.data_map().is_empty());
    assert_eq!(s.dump(VarId(2)), None);
    assert!(s.read(T2, ReadWrite, Timestamp(2), VarId(2)).is_err());
    assert!(s.accessed_transactions().is_empty());

    s.recover(Timestamp(4));
    assert_eq!(s.last_recover_time(), Some(Timestamp(4)));
    assert_eq!(s.pending_writer(VarId(2)), None);
    assert_eq!(s.dump(VarId(2)), Some(20));
    Ok(())
}

#[test]
fn test_replicated_unreadable_until_commit() -> Result<()> {
    let mut s = site();
    s.fail(Timestamp(2));
    s.recover(Timestamp(3));

    // Unreplicated copies are the only copies; nothing could have moved on.
    assert_eq!(s.read(T1, ReadWrite, Timestamp(4), VarId(1))?, found(10, 0));

    assert_eq!(s.read(T1, ReadWrite, Timestamp(4), VarId(2))?, ReadOutcome::Unavailable);
    assert_eq!(s.read(T3, ReadOnly, Timestamp(4), VarId(2))?, ReadOutcome::Unavailable);
    assert!(s.is_writable(T2, VarId(2)));

    s.write(T2, VarId(2), 22)?;
    assert_eq!(s.read(T1, ReadWrite, Timestamp(4), VarId(2))?, ReadOutcome::Conflict(T2));
    assert!(!s.is_readable(VarId(2)));
    s.commit(T2, Timestamp(5));
    assert!(s.is_readable(VarId(2)));
    assert_eq!(s.read(T1, ReadWrite, Timestamp(4), VarId(2))?, found(22, 5));
    assert!(!s.is_readable(VarId(4)));
    Ok(())
}

#[test]
fn test_recover_of_running_site_is_ignored() {
    let mut s = site();
    s.recover(Timestamp(2));
    assert_eq!(s.last_recover_time(), None);
    assert!(s.is_readable(VarId(2)));
}

#[test]
fn test_snapshot_needs_continuous_uptime() -> Result<()> {
    let mut s = site();
    s.write(T1, VarId(2), 21)?;
    s.commit(T1, Timestamp(2));
    s.fail(Timestamp(4));
    s.recover(Timestamp(6));
    s.write(T2, VarId(2), 22)?;
    s.commit(T2, Timestamp(7));
    assert!(s.is_readable(VarId(2)));
    assert!(s.failed_between(Timestamp(2), Timestamp(4)));
    assert!(!s.failed_between(Timestamp(4), Timestamp(9)));

    // Started before the failure: the version from tick 2 was still current here.
    assert_eq!(s.read(T3, ReadOnly, Timestamp(3), VarId(2))?, found(21, 2));
    // Started while down or after: something newer may have committed elsewhere.
    assert_eq!(s.read(T3, ReadOnly, Timestamp(5), VarId(2))?, ReadOutcome::Unavailable);
    assert_eq!(s.read(T3, ReadOnly, Timestamp(6), VarId(2))?, ReadOutcome::Unavailable);
    // Versions committed after recovery are fine.
    assert_eq!(s.read(T3, ReadOnly, Timestamp(8), VarId(2))?, found(22, 7));
    // Unreplicated copies are the only copies.
    assert_eq!(s.read(T3, ReadOnly, Timestamp(5), VarId(1))?, found(10, 0));
    Ok(())
}
