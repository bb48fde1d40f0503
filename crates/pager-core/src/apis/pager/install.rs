//! Registers the `pager.k8s.co` group with a scheme and registry.

use std::collections::BTreeSet;

use crate::registry::{
    ApiRegistrationManager, GroupFactoryRegistry, GroupMetaFactory, GroupMetaFactoryArgs,
    RegistryResult,
};
use crate::scheme::Scheme;

use super::{GROUP_NAME, v1alpha1, v1beta1};

/// Announce the group, then add every enabled version to `scheme`.
///
/// Must run once per process; a second call reports the group as already
/// announced.
pub fn install(
    announced: &mut GroupFactoryRegistry,
    manager: &mut ApiRegistrationManager,
    scheme: &mut Scheme,
) -> RegistryResult<()> {
    let factory = GroupMetaFactory::new(GroupMetaFactoryArgs {
        group_name: GROUP_NAME,
        version_preference_order: vec![v1alpha1::VERSION, v1beta1::VERSION],
        root_scoped_kinds: BTreeSet::new(),
        add_internal_objects: super::add_to_scheme,
    })
    .version(v1alpha1::VERSION, v1alpha1::add_to_scheme)
    .version(v1beta1::VERSION, v1beta1::add_to_scheme);

    announced.announce(factory)?.register_and_enable(manager, scheme)
}
