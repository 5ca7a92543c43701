use crate::channel::CompanionChannel;
use crate::config::LoaderConfigs;
use log::debug;
use std::os::fd::OwnedFd;
use zyscope_protocol::service;
use zyscope_protocol::store::SqliteScopeStore;

/// Answers one target query; the connection is closed on return.
pub fn handle(fd: OwnedFd) {
    let store = SqliteScopeStore::new(&LoaderConfigs::instance().db_path);

    if let Some(verdict) = service::serve(CompanionChannel::from(fd), &store) {
        debug!("replied {verdict:?}");
    }
}
