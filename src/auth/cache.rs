// src/auth/cache.rs
// Permission cache: member rows and Founder Rights lookups

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::models::TeamMember;

struct CacheInner {
    members: HashMap<(String, String), (Option<TeamMember>, Instant)>,
    founder: HashMap<String, (bool, Instant)>,
}

/// TTL cache in front of the hot authorization lookups. One mutex guards
/// both maps; mutating paths invalidate their keys after the write lands.
pub struct PermissionCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
}

impl PermissionCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                members: HashMap::new(),
                founder: HashMap::new(),
            }),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub fn get_member(&self, team_id: &str, user_id: &str) -> Option<Option<TeamMember>> {
        let inner = self.inner.lock();
        inner
            .members
            .get(&(team_id.to_string(), user_id.to_string()))
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(member, _)| member.clone())
    }

    pub fn put_member(&self, team_id: &str, user_id: &str, member: Option<TeamMember>) {
        self.inner
            .lock()
            .members
            .insert((team_id.to_string(), user_id.to_string()), (member, Instant::now()));
    }

    pub fn invalidate_member(&self, team_id: &str, user_id: &str) {
        self.inner
            .lock()
            .members
            .remove(&(team_id.to_string(), user_id.to_string()));
    }

    pub fn get_founder(&self, user_id: &str) -> Option<bool> {
        let inner = self.inner.lock();
        inner
            .founder
            .get(user_id)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(flag, _)| *flag)
    }

    pub fn put_founder(&self, user_id: &str, flag: bool) {
        self.inner
            .lock()
            .founder
            .insert(user_id.to_string(), (flag, Instant::now()));
    }

    pub fn invalidate_founder(&self, user_id: &str) {
        self.inner.lock().founder.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_hits_expire_with_ttl() {
        let cache = PermissionCache::new(0);
        cache.put_member("t1", "u1", None);
        assert!(cache.get_member("t1", "u1").is_none());

        let cache = PermissionCache::new(60);
        cache.put_member("t1", "u1", None);
        // A cached negative lookup is still a hit
        assert_eq!(cache.get_member("t1", "u1"), Some(None));
    }

    #[test]
    fn invalidation_removes_entries() {
        let cache = PermissionCache::new(60);
        cache.put_founder("u1", true);
        assert_eq!(cache.get_founder("u1"), Some(true));

        cache.invalidate_founder("u1");
        assert!(cache.get_founder("u1").is_none());
    }
}
