//! Dropwire Core: persisted-query operation templates, variable overlays,
//! pub/sub topic addressing and connection capacity arithmetic.

pub mod capacity;
pub mod merge;
pub mod operation;
pub mod registry;
pub mod topic;
pub mod variables;

pub use capacity::{CapacityError, CapacityModel};
pub use merge::{merge, MergeError};
pub use operation::{OperationError, OperationTemplate, SpecializedOperation, PERSISTED_QUERY_VERSION};
pub use registry::{names, OperationRegistry};
pub use topic::{kinds, EntityId, ResolvedTopic, TopicAddress, TopicCategory, TopicError, TopicHandler, TopicNameTable};
pub use variables::{VarValue, VariableTree};
