//! API groups served by this workspace.

pub mod pager;

use crate::meta;
use crate::registry::{ApiRegistrationManager, GroupFactoryRegistry, RegistryResult};
use crate::scheme::Scheme;

/// Populate the process registries with every served group plus the meta
/// kinds the serving layer needs.
pub fn install_all(
    announced: &mut GroupFactoryRegistry,
    manager: &mut ApiRegistrationManager,
    scheme: &mut Scheme,
) -> RegistryResult<()> {
    pager::install::install(announced, manager, scheme)?;

    // Options kinds for the empty-group v1 used by query parameter decoding.
    meta::add_to_group_version(scheme, &meta::meta_group_version())?;
    meta::add_unversioned_meta_types(scheme)?;
    Ok(())
}
