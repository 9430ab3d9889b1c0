use super::{Group, Member, Transfer, UpstreamApi, UpstreamError, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// [`UpstreamApi`] answering from fixed data
#[derive(Default)]
pub struct StaticUpstream {
    /// Groups by code
    pub groups: HashMap<String, Group>,
    /// Members by group code
    pub members: HashMap<String, Vec<Member>>,
    /// Users by member id
    pub users: HashMap<String, Vec<User>>,
    /// Transfers by id
    pub transfers: HashMap<String, Transfer>,
    /// Users by bearer token
    pub tokens: HashMap<String, User>,
    offline: AtomicBool,
}

impl StaticUpstream {
    /// Makes every subsequent lookup fail
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), UpstreamError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(UpstreamError::Status {
                url: "static".into(),
                status: 503,
            })
        } else {
            Ok(())
        }
    }
}

fn missing(what: &str) -> UpstreamError {
    UpstreamError::NotFound(what.to_owned())
}

#[async_trait]
impl UpstreamApi for StaticUpstream {
    async fn group(&self, code: &str) -> Result<Group, UpstreamError> {
        self.check()?;
        self.groups.get(code).cloned().ok_or_else(|| missing(code))
    }

    async fn group_members(&self, code: &str) -> Result<Vec<Member>, UpstreamError> {
        self.check()?;
        Ok(self.members.get(code).cloned().unwrap_or_default())
    }

    async fn member(&self, code: &str, id: &str) -> Result<Member, UpstreamError> {
        self.check()?;
        self.members
            .get(code)
            .and_then(|members| members.iter().find(|m| m.id == id))
            .cloned()
            .ok_or_else(|| missing(id))
    }

    async fn member_users(&self, member: &str) -> Result<Vec<User>, UpstreamError> {
        self.check()?;
        Ok(self.users.get(member).cloned().unwrap_or_default())
    }

    async fn transfer(&self, _code: &str, id: &str) -> Result<Transfer, UpstreamError> {
        self.check()?;
        self.transfers.get(id).cloned().ok_or_else(|| missing(id))
    }

    async fn user_by_token(&self, token: &str) -> Result<User, UpstreamError> {
        self.check()?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or(UpstreamError::Unauthorized)
    }
}
