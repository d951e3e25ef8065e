use crate::{SiteId, SiteSet};
use test_log::test;

#[test]
fn test_insert_contains() {
    let mut s = SiteSet::new();
    assert!(s.is_empty());
    s.insert(SiteId(3));
    s.insert(SiteId(200));
    assert!(s.contains(SiteId(3)));
    assert!(s.contains(SiteId(200)));
    assert!(!s.contains(SiteId(4)));
    assert_eq!(s.len(), 2);
    s.insert(SiteId(3));
    assert_eq!(s.len(), 2);
}

#[test]
fn test_iter_ascending() {
    let s: SiteSet = [SiteId(9), SiteId(2), SiteId(65), SiteId(1)].into_iter().collect();
    let order: Vec<u8> = s.iter().map(|x| x.0).collect();
    assert_eq!(order, vec![1, 2, 9, 65]);
}

#[test]
fn test_first_n_and_single() {
    let ten = SiteSet::first_n(10);
    assert_eq!(ten.len(), 10);
    assert!(!ten.contains(SiteId(0)));
    assert!(ten.contains(SiteId(10)));
    assert!(!ten.contains(SiteId(11)));

    let s = SiteSet::single(SiteId(12));
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![SiteId(12)]);
    assert_eq!(SiteSet::first_n(255).len(), 255);
}
