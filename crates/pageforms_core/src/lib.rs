pub mod autocomplete;
pub mod cache;
pub mod config;
pub mod error;
pub mod external_values;
pub mod forms;
pub mod labels;
pub mod page_values;
pub mod predicate;
pub mod property_values;
pub mod red_links;
pub mod request;
pub mod schema;
pub mod store;
pub mod table_values;
pub mod title;
