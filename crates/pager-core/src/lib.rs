pub mod apis;
pub mod codec;
pub mod config;
pub mod meta;
pub mod registry;
pub mod scheme;
pub mod schema;
pub mod selector;

pub use codec::{CodecError, CodecFactory, ParameterCodec, VersionedCodec};
pub use config::ServerConfigFile;
pub use registry::{ApiRegistrationManager, GroupFactoryRegistry, GroupMeta, RegistryError};
pub use scheme::{Object, Scheme, SchemeError};
pub use schema::{GroupResource, GroupVersion, GroupVersionKind};
pub use selector::{FieldSelector, LabelSelector, SelectorError};
