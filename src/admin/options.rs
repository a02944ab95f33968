use serde::Serialize;

/// Static description of how one model is administered.
#[derive(Debug, Serialize)]
pub struct ModelAdmin {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub verbose_name_plural: &'static str,
    /// Columns of the list view, in order. A relation name renders the
    /// referenced row's label.
    pub list_display: &'static [&'static str],
    /// Fields matched by the search box; `relation__field` crosses one hop.
    pub search_fields: &'static [&'static str],
    pub list_filter: &'static [ListFilter],
    /// Relations edited through a search-as-you-type widget.
    pub autocomplete_fields: &'static [&'static str],
    pub inlines: &'static [InlineAdmin],
    pub actions: &'static [Action],
}

impl ModelAdmin {
    pub fn action(&self, name: &str) -> Option<&'static Action> {
        self.actions.iter().find(|action| action.name == name)
    }

    pub fn inline(&self, model: &str) -> Option<&'static InlineAdmin> {
        self.inlines.iter().find(|inline| inline.model == model)
    }

    pub fn filter(&self, parameter: &str) -> Option<&'static ListFilter> {
        self.list_filter.iter().find(|filter| filter.parameter() == parameter)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListFilter {
    /// Exact match on one of the model's own columns.
    Field { field: &'static str },
    /// Offers every row of a related model as a choice and matches on the
    /// foreign key.
    Related { title: &'static str, parameter: &'static str, relation: &'static str },
}

impl ListFilter {
    pub fn parameter(&self) -> &'static str {
        match self {
            ListFilter::Field { field } => *field,
            ListFilter::Related { parameter, .. } => *parameter,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ListFilter::Field { field } => *field,
            ListFilter::Related { title, .. } => *title,
        }
    }
}

/// Child rows edited on the parent's change view.
#[derive(Debug, Serialize)]
pub struct InlineAdmin {
    pub model: &'static str,
    /// Foreign key column on the child pointing at the parent.
    pub fk: &'static str,
    pub fields: &'static [&'static str],
    pub readonly_fields: &'static [&'static str],
    /// Blank rows offered for new children.
    pub extra: usize,
    pub can_delete: bool,
    pub autocomplete_fields: &'static [&'static str],
}

impl InlineAdmin {
    pub fn editable_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().copied().filter(|field| !self.readonly_fields.contains(field))
    }
}

#[derive(Debug, Serialize)]
pub struct Action {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub kind: ActionKind,
}

#[derive(Clone, Copy, Debug)]
pub enum ActionKind {
    /// Delete the selected rows (with their dependents) in one transaction.
    DeleteSelected { noun: &'static str },
    /// Report a message and change nothing.
    Notice(&'static str),
}

#[derive(Clone, Debug, Serialize)]
pub struct ActionOutcome {
    pub action: &'static str,
    pub affected: u64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const INLINE: InlineAdmin = InlineAdmin {
        model: "user_movie",
        fk: "user_id",
        fields: &["movie", "rating", "created_at"],
        readonly_fields: &["created_at"],
        extra: 0,
        can_delete: true,
        autocomplete_fields: &[],
    };

    #[test]
    fn readonly_fields_are_not_editable() {
        assert_eq!(INLINE.editable_fields().collect::<Vec<_>>(), vec!["movie", "rating"]);
    }

    #[test]
    fn related_filters_use_their_own_parameter() {
        let filter = ListFilter::Related { title: "Movie", parameter: "movie", relation: "movie" };
        assert_eq!(filter.parameter(), "movie");
        assert_eq!(filter.title(), "Movie");
        assert_eq!(ListFilter::Field { field: "created_at" }.parameter(), "created_at");
    }
}
