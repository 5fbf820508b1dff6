mod core;
mod error;
mod ops;
mod plugin;
mod render;
pub mod table;
mod toolbar;
mod tree;
mod value;

pub use crate::core::*;
pub use crate::error::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::render::*;
pub use crate::table::TablePlugin;
pub use crate::table::edit::{ColumnSide, RowSide};
pub use crate::table::lifecycle::{
    ConfigurationRequest, Dialog, DialogField, DialogResult, TableConfiguration, TableState,
};
pub use crate::table::model::{Section, TableModel};
pub use crate::table::schema::{BorderSide, BorderState, BorderTarget};
pub use crate::toolbar::*;
pub use crate::tree::*;
pub use crate::value::*;
