//! Table schema constants
//!
//! ```text
//! Table: publications (configurable)
//!
//! Primary Key:
//!   - PK0 (String, Partition Key): {type}#Customer#{customerId}#Owner#{owner}
//!   - SK0 (String, Sort Key):      {type}#{identifier}
//!
//! Global Secondary Indexes:
//!   - ByCustomerStatus: PK1 / SK1
//!   - ByResource:       PK2 / SK2 (sparse; absent on resources)
//!
//! Uniqueness guards:
//!   - PK0 = SK0 = UniqueIdentifier#{type}#{identifier}, written with the entry
//!
//! Attributes:
//!   - type: String - entry discriminator
//!   - identifier: String
//!   - rowVersion: String - optimistic concurrency token
//!   - data: Map - the full entry
//! ```

pub const ATTR_PK0: &str = "PK0";
pub const ATTR_SK0: &str = "SK0";
pub const ATTR_PK1: &str = "PK1";
pub const ATTR_SK1: &str = "SK1";
pub const ATTR_PK2: &str = "PK2";
pub const ATTR_SK2: &str = "SK2";

pub const ATTR_TYPE: &str = "type";
pub const ATTR_IDENTIFIER: &str = "identifier";

/// Concurrency token; compared in every conditional update.
pub const ATTR_ROW_VERSION: &str = "rowVersion";

pub const ATTR_DATA: &str = "data";

pub const INDEX_BY_CUSTOMER_STATUS: &str = "ByCustomerStatus";
pub const INDEX_BY_RESOURCE: &str = "ByResource";

pub const DEFAULT_TABLE_NAME: &str = "publications";
