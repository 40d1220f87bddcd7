//! Integration Tests for the Reload Manager
//!
//! These tests drive a small unit namespace shaped like a package tree:
//!
//! ```text
//! test
//! test.a          plain unit
//! test.b          plain unit
//! test.c          resolves test.c.d during setup
//! test.c.d        holds references back to test and test.c (cycle)
//! test.e          resolves test.a, reaches test.b only through test.a
//! ```

use std::error::Error as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;

use lazy_reload_core::reload::{Interceptor, PendingInterceptor};
use lazy_reload_core::{
    LoaderTable, ReloadConfig, ReloadError, ReloadManager, Result, Unit, UnitName, UnitState,
};

fn test_namespace() -> LoaderTable {
    LoaderTable::new()
        .unit("test", |_, unit| {
            unit.set_attr("kind", json!("package"));
            Ok(())
        })
        .unit("test.a", |_, unit| {
            unit.set_attr("value", json!(unit.generation() + 1));
            Ok(())
        })
        .unit("test.b", |_, unit| {
            unit.set_attr("value", json!("b"));
            Ok(())
        })
        .unit("test.c", |manager, unit| {
            let d = manager.resolve("test.c.d")?;
            unit.set_attr("d", d);
            Ok(())
        })
        .unit("test.c.d", |manager, unit| {
            let test = manager.resolve("test")?;
            let c = manager.resolve("test.c")?;
            unit.set_attr("test", test);
            unit.set_attr("c", c);
            Ok(())
        })
        .unit("test.e", |manager, unit| {
            let a = manager.resolve("test.a")?;
            if let Some(b) = a.attr_unit("b") {
                unit.set_attr("b", b);
            }
            unit.set_attr("a", a);
            Ok(())
        })
}

fn manager() -> ReloadManager {
    ReloadManager::new(test_namespace())
}

fn names(list: &[UnitName]) -> Vec<&str> {
    list.iter().map(UnitName::as_str).collect()
}

fn assert_history(manager: &ReloadManager, expected: &[&str]) {
    let drained = manager.take_history();
    let actual: Vec<&str> = drained.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(actual, expected);
}

/// Plain lookups of up-to-date units never reload anything.
#[test]
fn resolving_live_units_never_reloads() {
    let manager = manager();

    for _ in 0..5 {
        manager.resolve("test.a").unwrap();
        manager.resolve("test").unwrap();
        manager.fetch_member("test", "b").unwrap();
    }

    assert_history(&manager, &[]);
}

/// Invalidation is lazy and descendants reload only when they are used.
#[test]
fn invalidation_is_lazy_per_descendant() {
    let manager = manager();
    manager.resolve("test.a").unwrap();

    manager.invalidate("test");
    assert_history(&manager, &[]);

    manager.resolve("test").unwrap();
    assert_history(&manager, &["test"]);
    assert_eq!(manager.state_of("test.a"), UnitState::Pending);

    manager.resolve("test.a").unwrap();
    assert_history(&manager, &["test.a"]);
    assert_eq!(manager.state_of("test.a"), UnitState::Live);
}

/// Invalidating an unrelated name leaves everything else alone.
#[test]
fn invalidating_a_sibling_does_not_touch_others() {
    let manager = manager();
    manager.resolve("test.a").unwrap();
    manager.resolve("test.b").unwrap();

    manager.invalidate("test.a");
    manager.resolve("test.b").unwrap();
    assert_history(&manager, &[]);
}

/// Invalidating twice before any lookup is the same as invalidating once.
#[test]
fn invalidate_is_idempotent() {
    let manager = manager();
    manager.resolve("test.a").unwrap();
    manager.resolve("test.b").unwrap();

    manager.invalidate("test");
    let once = manager.pending_names();
    manager.invalidate("test");
    assert_eq!(manager.pending_names(), once);

    manager.resolve("test").unwrap();
    assert_history(&manager, &["test"]);
}

/// Unknown names and already pending names are not errors.
#[test]
fn invalidate_unregistered_is_noop() {
    let manager = manager();
    manager.invalidate("nowhere.at.all");
    assert!(manager.pending_names().is_empty());
    assert!(manager.live_names().is_empty());
}

/// A unit handle works as an invalidation target.
#[test]
fn invalidate_by_unit_reference() {
    let manager = manager();
    let a = manager.resolve("test.a").unwrap();

    manager.invalidate(&a);
    assert_eq!(manager.state_of("test.a"), UnitState::Pending);

    let reloaded = manager.resolve("test.a").unwrap();
    assert!(reloaded.ptr_eq(&a));
    assert_eq!(a.attr_value("value"), Some(json!(2)));
}

/// Fetching members reloads only the members that are stale.
#[test]
fn member_fetch_reloads_only_pending_members() {
    let manager = manager();
    let fetched = manager.fetch_members("test", &["a", "b"]).unwrap();
    let a = fetched[0].as_unit().unwrap().clone();
    assert_history(&manager, &[]);

    manager.invalidate("test.a");
    let fetched = manager.fetch_members("test", &["a", "b"]).unwrap();

    assert_history(&manager, &["test.a"]);
    assert_eq!(manager.state_of("test.b"), UnitState::Live);
    assert!(fetched[0].as_unit().unwrap().ptr_eq(&a));
}

/// A stale member is reloaded even if the parent still caches it.
#[test]
fn member_fetch_sees_through_cached_attribute() {
    let manager = manager();
    manager.resolve("test.a").unwrap();
    let test = manager.peek("test").unwrap();
    assert!(test.has_attr("a"));

    manager.invalidate("test.a");
    manager.fetch_member("test", "a").unwrap();
    assert_history(&manager, &["test.a"]);
}

/// Re-invalidating the parent reloads it, then the fetched member.
#[test]
fn member_fetch_after_parent_invalidation() {
    let manager = manager();
    manager.fetch_member("test", "a").unwrap();

    manager.invalidate("test");
    manager.fetch_member("test", "a").unwrap();
    assert_history(&manager, &["test", "test.a"]);
}

#[test]
fn member_fetch_reports_missing_member() {
    let manager = manager();
    let err = manager.fetch_member("test", "zz").unwrap_err();
    assert!(matches!(err, ReloadError::MissingMember { member, .. } if member == "zz"));
}

/// Data attributes are fetched like unit members.
#[test]
fn member_fetch_returns_plain_values() {
    let manager = manager();
    let kind = manager.fetch_member("test", "kind").unwrap();
    assert_eq!(kind.as_value(), Some(&json!("package")));
}

/// Cyclic units reload depth-first, exactly once each, keeping identity.
#[test]
fn cycle_reload_preserves_identity() {
    let manager = manager();
    let c = manager.resolve("test.c").unwrap();
    let d = manager.peek("test.c.d").unwrap();

    let back = d.attr_unit("test").unwrap().attr_unit("c").unwrap();
    assert!(back.ptr_eq(&c));
    assert_history(&manager, &[]);

    manager.invalidate("test");
    manager.resolve("test.c.d").unwrap();

    let records = manager.take_history();
    let order: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order, vec!["test", "test.c", "test.c.d"]);

    let depths: Vec<usize> = records.iter().map(|r| r.depth).collect();
    assert_eq!(depths, vec![0, 0, 1]);

    let test = manager.peek("test").unwrap();
    assert!(test.attr_unit("c").unwrap().ptr_eq(&c));
    assert!(d.attr_unit("c").unwrap().ptr_eq(&c));
    assert!(d.attr_unit("test").unwrap().attr_unit("c").unwrap().ptr_eq(&c));
    assert!(manager.peek("test.c.d").unwrap().ptr_eq(&d));
}

/// A unit whose setup looks itself up gets its in-progress self back.
#[test]
fn self_referencing_unit_terminates() {
    let table = LoaderTable::new().unit("loop", |manager, unit| {
        let me = manager.resolve("loop")?;
        assert!(me.ptr_eq(unit));
        unit.set_attr("me", me);
        Ok(())
    });
    let manager = ReloadManager::new(table);

    let unit = manager.resolve("loop").unwrap();
    manager.invalidate("loop");
    manager.resolve("loop").unwrap();

    assert_history(&manager, &["loop"]);
    assert_eq!(unit.generation(), 2);
}

/// Direct lookups reload a stale dependency; references reached through
/// another unit's attributes do not.
#[test]
fn sibling_reached_through_attribute_stays_pending() {
    let manager = manager();
    let a = manager.resolve("test.a").unwrap();
    let b = manager.resolve("test.b").unwrap();
    a.set_attr("b", &b);
    manager.resolve("test.e").unwrap();
    assert_history(&manager, &[]);

    manager.invalidate(&a);
    manager.invalidate(&b);
    let e = manager.reload_now("test.e").unwrap();

    assert_history(&manager, &["test.e", "test.a"]);
    assert_eq!(manager.state_of("test.a"), UnitState::Live);
    assert_eq!(manager.state_of("test.b"), UnitState::Pending);
    assert!(e.attr_unit("b").unwrap().ptr_eq(&b));
}

/// The manager can reload itself without losing its bookkeeping.
#[test]
fn manager_survives_its_own_reload() {
    let config = ReloadConfig::default().with_self_name("lazy_reload");
    let manager = ReloadManager::with_config(test_namespace(), config).unwrap();

    manager.resolve("lazy_reload").unwrap();
    assert_history(&manager, &[]);

    manager.resolve("test.a").unwrap();
    manager.resolve("test.b").unwrap();
    manager.invalidate("test.b");

    manager.invalidate("lazy_reload");
    assert_history(&manager, &[]);
    manager.resolve("lazy_reload").unwrap();
    assert_history(&manager, &["lazy_reload"]);

    assert_eq!(manager.interceptor_count(), 1);
    assert_eq!(manager.state_of("test.a"), UnitState::Live);
    assert_eq!(manager.state_of("test.b"), UnitState::Pending);

    manager.invalidate("lazy_reload");
    let version = manager.fetch_member("lazy_reload", "version").unwrap();
    assert_eq!(version.as_value(), Some(&json!(env!("CARGO_PKG_VERSION"))));
    assert_history(&manager, &["lazy_reload"]);

    manager.resolve("test.b").unwrap();
    assert_history(&manager, &["test.b"]);
    assert_eq!(manager.interceptor_count(), 1);
}

/// Installing the lazy reload hook again replaces it rather than stacking.
#[test]
fn duplicate_interceptor_is_replaced() {
    let manager = manager();
    assert!(manager.install_interceptor(Arc::new(PendingInterceptor)));
    assert!(manager.install_interceptor(Arc::new(PendingInterceptor)));
    assert_eq!(manager.interceptor_count(), 1);

    manager.resolve("test.a").unwrap();
    manager.invalidate("test.a");
    manager.resolve("test.a").unwrap();
    assert_history(&manager, &["test.a"]);
}

/// A failed reload leaves the unit Live and is not retried by itself.
#[test]
fn failed_reinitialize_propagates_without_retry() {
    let failing = Arc::new(AtomicBool::new(false));
    let flag = failing.clone();
    let table = LoaderTable::new()
        .unit("svc", |_, _| Ok(()))
        .unit("svc.conn", move |_, unit| {
            if flag.load(Ordering::SeqCst) {
                unit.set_attr("half", json!(true));
                return Err("connection refused".into());
            }
            unit.set_attr("half", json!(false));
            Ok(())
        });
    let manager = ReloadManager::new(table);

    let conn = manager.resolve("svc.conn").unwrap();
    failing.store(true, Ordering::SeqCst);
    manager.invalidate("svc.conn");

    let err = manager.resolve("svc.conn").unwrap_err();
    assert!(matches!(err, ReloadError::Reinitialize { .. }));
    assert_eq!(err.source().unwrap().to_string(), "connection refused");
    assert_history(&manager, &["svc.conn"]);

    assert_eq!(manager.state_of("svc.conn"), UnitState::Live);
    assert_eq!(conn.attr_value("half"), Some(json!(true)));
    assert_eq!(conn.generation(), 1);

    manager.resolve("svc.conn").unwrap();
    assert_history(&manager, &[]);

    failing.store(false, Ordering::SeqCst);
    manager.invalidate("svc.conn");
    manager.resolve("svc.conn").unwrap();
    assert_history(&manager, &["svc.conn"]);
    assert_eq!(conn.generation(), 2);
}

/// With purge enabled, nested unit references are dropped before reload.
#[test]
fn purge_on_reload_drops_nested_references() {
    let config = ReloadConfig::default().with_purge_on_reload(true);
    let manager = ReloadManager::with_config(test_namespace(), config).unwrap();
    manager.resolve("test.a").unwrap();

    manager.invalidate("test");
    let test = manager.resolve("test").unwrap();
    assert!(!test.has_attr("a"));
    assert_history(&manager, &["test"]);

    manager.fetch_member("test", "a").unwrap();
    assert_history(&manager, &["test.a"]);
    assert!(test.has_attr("a"));
}

/// Without ancestor resolution only the named unit is looked at.
#[test]
fn ancestor_resolution_can_be_disabled() {
    let config = ReloadConfig::default().with_resolve_ancestors(false);
    let manager = ReloadManager::with_config(test_namespace(), config).unwrap();

    manager.resolve("test.a").unwrap();
    assert_eq!(manager.state_of("test"), UnitState::Unregistered);
    assert_eq!(names(&manager.live_names()), vec!["test.a"]);
}

/// Custom hooks run after the lazy reload hook and see every lookup.
#[test]
fn custom_interceptor_observes_resolution() {
    struct Audit(parking_lot::Mutex<Vec<String>>);

    impl Interceptor for Audit {
        fn kind(&self) -> &'static str {
            "audit"
        }

        fn on_resolve(&self, _: &ReloadManager, name: &UnitName) -> Result<Option<Unit>> {
            self.0.lock().push(name.to_string());
            Ok(None)
        }
    }

    let manager = manager();
    let audit = Arc::new(Audit(parking_lot::Mutex::new(Vec::new())));
    manager.install_interceptor(audit.clone());

    manager.resolve("test.a").unwrap();
    assert_eq!(*audit.0.lock(), vec!["test", "test.a"]);
    assert_eq!(manager.interceptor_kinds(), vec![PendingInterceptor::KIND, "audit"]);
}

#[test]
fn history_serializes_to_json() {
    let manager = manager();
    manager.resolve("test.a").unwrap();
    manager.invalidate("test.a");
    manager.resolve("test.a").unwrap();

    let json = manager.history().to_json().unwrap();
    assert_eq!(json, r#"{"records":[{"seq":0,"name":"test.a","depth":0}]}"#);
}

/// Without the lazy reload hook a stale unit is refused, never rebuilt.
#[test]
fn pending_unit_keeps_identity_without_hook() {
    let manager = manager();
    let a = manager.resolve("test.a").unwrap();
    manager.invalidate("test.a");

    assert!(manager.remove_interceptor(PendingInterceptor::KIND));
    let err = manager.resolve("test.a").unwrap_err();
    assert!(matches!(err, ReloadError::Quarantined(ref name) if name.as_str() == "test.a"));
    assert_eq!(manager.state_of("test.a"), UnitState::Pending);
    assert_history(&manager, &[]);

    manager.install_interceptor(Arc::new(PendingInterceptor));
    let again = manager.resolve("test.a").unwrap();
    assert!(again.ptr_eq(&a));
    assert_eq!(a.generation(), 2);
    assert_history(&manager, &["test.a"]);
}

/// The manager registers itself only under a top-level name.
#[test]
fn nested_self_name_is_rejected() {
    let config = ReloadConfig::default().with_self_name("tools.lazy_reload");
    let err = ReloadManager::with_config(test_namespace(), config).unwrap_err();
    assert!(matches!(
        err,
        ReloadError::InvalidName { ref name, .. } if name == "tools.lazy_reload"
    ));
}

/// An unparsable reload target is reported by its own text.
#[test]
fn reload_now_reports_invalid_target() {
    let manager = manager();
    let err = manager.reload_now("test..a").unwrap_err();
    assert!(matches!(err, ReloadError::InvalidName { ref name, .. } if name == "test..a"));
    assert_history(&manager, &[]);
}
