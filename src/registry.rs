//! Process-wide Session registry. One mutex-protected list, looked up by
//! `(host, port, path, protocol-family)`; see SPEC_FULL.md §4.7.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::error::PlcResult;
use crate::path::{cip_encode_path, PlcFamily};
use crate::session::{Session, SessionKey, SessionState};

struct Registry {
    sessions: Mutex<Vec<Arc<Session>>>,
}

impl Registry {
    fn new() -> Self {
        Self { sessions: Mutex::new(Vec::new()) }
    }
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}

/// Looks up a session by `(host, port, path, family)`, creating and
/// starting one if none exists. Increments the found/created session's
/// reference count; the caller must call [`release_session`] when the tag
/// holding it is destroyed.
pub fn find_or_create_session(
    host: &str,
    port: u16,
    path: Option<&str>,
    family: PlcFamily,
) -> PlcResult<Arc<Session>> {
    let encoded_path = cip_encode_path(path, family.requires_cip_connection(), family)?;
    let key = SessionKey {
        host: host.to_string(),
        port,
        path_bytes: encoded_path.bytes.clone(),
        is_pccc: family.is_pccc(),
    };

    let mut sessions = registry().sessions.lock();
    if let Some(existing) = sessions.iter().find(|s| s.key == key) {
        existing.acquire();
        return Ok(Arc::clone(existing));
    }

    let session = Arc::new(Session::new(key, family, encoded_path));
    session.acquire();
    sessions.push(Arc::clone(&session));
    Ok(session)
}

/// Decrements a session's reference count; once it reaches zero, starts the
/// session toward teardown (Forward Close then Unregister-Session if a CIP
/// connection is open, straight to Unregister-Session otherwise). The
/// session is only removed from the registry once the I/O Handler has
/// driven it all the way back to `Closed`, via [`prune_closed`].
pub fn release_session(session: &Arc<Session>) {
    if !session.release() {
        return;
    }
    session.begin_teardown();
}

/// A snapshot of every live session, for the I/O Handler's per-tick sweep.
pub fn snapshot() -> Vec<Arc<Session>> {
    registry().sessions.lock().clone()
}

/// Removes sessions that have no remaining tag references and have fully
/// torn down. Called once per I/O Handler pass.
pub fn prune_closed() {
    let mut sessions = registry().sessions.lock();
    sessions.retain(|s| s.ref_count() > 0 || s.state() != SessionState::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_same_session() {
        let a = find_or_create_session("10.0.0.1", 44818, Some("1,0"), PlcFamily::ControlLogix).unwrap();
        let b = find_or_create_session("10.0.0.1", 44818, Some("1,0"), PlcFamily::ControlLogix).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.ref_count(), 2);
        release_session(&a);
        release_session(&b);
    }

    #[test]
    fn different_path_is_a_different_session() {
        let a = find_or_create_session("10.0.0.2", 44818, Some("1,0"), PlcFamily::ControlLogix).unwrap();
        let b = find_or_create_session("10.0.0.2", 44818, Some("1,1"), PlcFamily::ControlLogix).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        release_session(&a);
        release_session(&b);
    }
}
