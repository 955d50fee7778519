pub mod dns;
pub mod plugin;
pub mod rrset;
pub mod wildcard;

pub use dns::DomainName;
pub use plugin::Filter;
