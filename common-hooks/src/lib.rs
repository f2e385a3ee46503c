//! Reactive state controllers for data tables, forms and modals.

pub mod data_table;
pub mod error;
pub mod form_state;
pub mod modal_state;
pub mod reactive;
pub mod state;

pub use data_table::DataTable;
pub use error::{FormError, QueryError};

pub mod prelude {
    pub use crate::data_table::{
        AppliedSort, ClientSource, DataTable, DataTableConfig, Direction, FilterMap,
        FilterOptions, ManualSource, Mode, Pagination, QueryConfig, QueryResult, ServerSource,
        Source, search,
    };
    pub use crate::error::{FormError, QueryError};
    pub use crate::form_state::{
        FieldError, FieldStatus, FormState, FormValues, Schema, SetValueOptions,
        ValidationResult,
    };
    pub use crate::modal_state::ModalState;
    pub use crate::reactive::{Effect, Memo, batch};
    pub use crate::state::{State, Subscription};
}
