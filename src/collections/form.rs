//! State of the "add to collection" console form.
//!
//! The form is a plain value: every user action produces a new
//! [`CollectionForm`] through [`CollectionForm::apply`], and a submitted form
//! is turned into reconciler input with [`CollectionForm::request`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::reconciler::CollectionTarget;
use crate::model::CollectionKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionForm {
    #[serde(default)]
    pub kind: CollectionKind,
    #[serde(default)]
    pub selected_collection_id: String,
    #[serde(default)]
    pub new_collection_name: String,
    /// Checkbox state per book id, in the order the books were first toggled.
    #[serde(default)]
    pub selected_book_ids: IndexMap<String, bool>,
    #[serde(default)]
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    SetKind(CollectionKind),
    SelectCollection(String),
    SetNewName(String),
    ToggleBook(String),
    SubmitStarted,
    SubmitSucceeded,
    SubmitFailed,
}

/// Reconciler input derived from a submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddBooksRequest {
    pub kind: CollectionKind,
    pub target: CollectionTarget,
    pub book_ids: Vec<String>,
}

impl CollectionForm {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn apply(self, action: FormAction) -> Self {
        match action {
            // collection ids are only meaningful within one kind
            FormAction::SetKind(kind) if kind != self.kind => Self {
                kind,
                selected_collection_id: String::new(),
                ..self
            },
            FormAction::SetKind(_) => self,
            FormAction::SelectCollection(id) => Self {
                selected_collection_id: id,
                ..self
            },
            FormAction::SetNewName(name) => Self {
                new_collection_name: name,
                ..self
            },
            FormAction::ToggleBook(id) => {
                if id.is_empty() {
                    return self;
                }
                let mut selected_book_ids = self.selected_book_ids;
                let checked = selected_book_ids.get(&id).copied().unwrap_or(false);
                selected_book_ids.insert(id, !checked);
                Self {
                    selected_book_ids,
                    ..self
                }
            }
            FormAction::SubmitStarted => Self { loading: true, ..self },
            FormAction::SubmitSucceeded => Self::new(self.kind),
            FormAction::SubmitFailed => Self { loading: false, ..self },
        }
    }

    /// Ids whose checkbox is currently on, in first-toggle order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.selected_book_ids
            .iter()
            .filter(|(_, checked)| **checked)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// A typed new name wins over a picked collection.
    pub fn request(&self) -> AddBooksRequest {
        let target = if self.new_collection_name.trim().is_empty() {
            CollectionTarget {
                existing_id: Some(self.selected_collection_id.clone()).filter(|id| !id.trim().is_empty()),
                new_name: None,
            }
        } else {
            CollectionTarget::named(self.new_collection_name.trim())
        };

        AddBooksRequest {
            kind: self.kind,
            target,
            book_ids: self.selected_ids(),
        }
    }

    /// Marks the form as submitting. Returns `None` while a previous
    /// submission is still in flight.
    pub fn begin_submit(self) -> Option<(Self, AddBooksRequest)> {
        if self.loading {
            return None;
        }
        let request = self.request();
        Some((self.apply(FormAction::SubmitStarted), request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> CollectionForm {
        CollectionForm::new(CollectionKind::Featured)
            .apply(FormAction::SelectCollection("F1".into()))
            .apply(FormAction::ToggleBook("b1".into()))
            .apply(FormAction::ToggleBook("b2".into()))
    }

    #[test]
    fn toggling_twice_deselects() {
        let form = filled().apply(FormAction::ToggleBook("b1".into()));
        assert_eq!(form.selected_ids(), vec!["b2".to_string()]);
    }

    #[test]
    fn selection_keeps_toggle_order() {
        let form = CollectionForm::default()
            .apply(FormAction::ToggleBook("b2".into()))
            .apply(FormAction::ToggleBook("b1".into()))
            .apply(FormAction::ToggleBook("b2".into()))
            .apply(FormAction::ToggleBook("b2".into()));
        assert_eq!(form.selected_ids(), vec!["b2".to_string(), "b1".to_string()]);

        let decoded: CollectionForm =
            serde_json::from_str(r#"{"selectedBookIds":{"b9":true,"b3":true,"b5":false}}"#).unwrap();
        assert_eq!(decoded.selected_ids(), vec!["b9".to_string(), "b3".to_string()]);
    }

    #[test]
    fn blank_book_ids_are_ignored() {
        let form = filled().apply(FormAction::ToggleBook(String::new()));
        assert_eq!(form.selected_book_ids.len(), 2);
    }

    #[test]
    fn changing_kind_clears_selected_collection() {
        let form = filled().apply(FormAction::SetKind(CollectionKind::Exclusive));
        assert_eq!(form.kind, CollectionKind::Exclusive);
        assert!(form.selected_collection_id.is_empty());
        assert_eq!(form.selected_ids().len(), 2);

        let same = filled().apply(FormAction::SetKind(CollectionKind::Featured));
        assert_eq!(same.selected_collection_id, "F1");
    }

    #[test]
    fn request_targets_existing_collection() {
        let request = filled().request();
        assert_eq!(request.kind, CollectionKind::Featured);
        assert_eq!(request.target, CollectionTarget::existing("F1"));
        assert_eq!(request.book_ids, vec!["b1".to_string(), "b2".to_string()]);
    }

    #[test]
    fn new_name_takes_precedence() {
        let request = filled()
            .apply(FormAction::SetNewName("  Winter Picks ".into()))
            .request();
        assert_eq!(request.target, CollectionTarget::named("Winter Picks"));
    }

    #[test]
    fn empty_form_yields_empty_target() {
        let request = CollectionForm::default().request();
        assert_eq!(request.target, CollectionTarget::default());
        assert!(request.book_ids.is_empty());
    }

    #[test]
    fn in_flight_form_refuses_second_submit() {
        let (submitting, _) = filled().begin_submit().unwrap();
        assert!(submitting.loading);
        assert!(submitting.begin_submit().is_none());
    }

    #[test]
    fn success_resets_and_failure_keeps_input() {
        let (submitting, _) = filled().apply(FormAction::SetNewName("X".into())).begin_submit().unwrap();

        let failed = submitting.clone().apply(FormAction::SubmitFailed);
        assert!(!failed.loading);
        assert_eq!(failed.new_collection_name, "X");
        assert_eq!(failed.selected_ids().len(), 2);

        let done = submitting.apply(FormAction::SubmitSucceeded);
        assert_eq!(done, CollectionForm::new(CollectionKind::Featured));
    }
}
