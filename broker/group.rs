// Group directory: group name -> channel and membership
use im_core::LineFramer;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// A chat group. Owns the read side of its channel for its whole lifetime,
/// plus a keepalive writer so the reader never sees end-of-stream while no
/// client happens to be writing.
///
/// Members are plain logins with no link to the session directory.
#[derive(Debug)]
pub struct Group<R, W> {
    name: String,
    channel: PathBuf,
    pub(crate) inbound: R,
    pub(crate) keepalive: Option<W>,
    members: BTreeSet<String>,
    pub(crate) framer: LineFramer,
}

impl<R, W> Group<R, W> {
    pub fn new(
        name: impl Into<String>,
        channel: PathBuf,
        inbound: R,
        keepalive: Option<W>,
        creator: &str,
    ) -> Self {
        let mut members = BTreeSet::new();
        members.insert(creator.to_string());
        Group {
            name: name.into(),
            channel,
            inbound,
            keepalive,
            members,
            framer: LineFramer::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> &PathBuf {
        &self.channel
    }

    pub fn inbound(&self) -> &R {
        &self.inbound
    }

    pub fn has_keepalive(&self) -> bool {
        self.keepalive.is_some()
    }

    /// Add a member. Joining twice is not an error; returns whether the set changed.
    pub fn join(&mut self, login: &str) -> bool {
        self.members.insert(login.to_string())
    }

    /// Remove a member. Returns whether the login was a member.
    pub fn leave(&mut self, login: &str) -> bool {
        self.members.remove(login)
    }

    pub fn is_member(&self, login: &str) -> bool {
        self.members.contains(login)
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug)]
pub struct GroupDirectory<R, W> {
    groups: HashMap<String, Group<R, W>>,
}

impl<R, W> Default for GroupDirectory<R, W> {
    fn default() -> Self {
        GroupDirectory {
            groups: HashMap::new(),
        }
    }
}

impl<R, W> GroupDirectory<R, W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Insert a group unless one with the same name exists, in which case
    /// the new group is handed back.
    pub fn insert(&mut self, group: Group<R, W>) -> Result<(), Group<R, W>> {
        if self.groups.contains_key(group.name()) {
            return Err(group);
        }
        self.groups.insert(group.name().to_string(), group);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Group<R, W>> {
        self.groups.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Group<R, W>> {
        self.groups.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Group<R, W>> {
        self.groups.get_mut(name)
    }

    /// Drop `login` from every group, member or not.
    pub fn prune_member(&mut self, login: &str) {
        for group in self.groups.values_mut() {
            group.leave(login);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group<R, W>> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Group<R, W>> + '_ {
        self.groups.drain().map(|(_, group)| group)
    }
}
