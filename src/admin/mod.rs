//! Administrative interface: static per-model descriptors and the site that
//! serves list, search, filter, inline edit and bulk actions over them.

mod catalog;
mod options;
mod site;

pub use options::{Action, ActionKind, ActionOutcome, InlineAdmin, ListFilter, ModelAdmin};
pub use site::{
    AdminSite, ChangeView, FilterChoice, FilterChoices, InlineChange, InlineFormset, InlineRows,
    SaveRequest,
};
