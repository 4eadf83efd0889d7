//! Modal dialogs the host can open over the console, and their edits.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::{Divider, Keyed};
use crate::store::edits::{edit_rows, ParameterEdit, RowError};
use crate::types::{Authorization, Parameter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Modal {
    #[serde(rename_all = "camelCase")]
    CollectionAuthorization {
        collection_id: String,
        authorization: Authorization,
    },
    #[serde(rename_all = "camelCase")]
    EnvironmentVariables {
        environment_id: String,
        name: String,
        variables: Keyed<Parameter>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", content = "edit", rename_all = "camelCase")]
pub enum ModalEdit {
    Authorization(Authorization),
    Variables(ParameterEdit),
}

impl Modal {
    pub(crate) fn apply(&mut self, edit: ModalEdit) -> Result<(), StoreError> {
        match (self, edit) {
            (
                Modal::CollectionAuthorization { authorization, .. },
                ModalEdit::Authorization(next),
            ) => {
                *authorization = next;
                Ok(())
            }
            (
                Modal::EnvironmentVariables {
                    environment_id,
                    variables,
                    ..
                },
                ModalEdit::Variables(edit),
            ) => edit_rows(variables, environment_id, Divider::EnvironmentVariable, edit).map_err(
                |e| {
                    let (reason, id) = match e {
                        RowError::Duplicate(id) => ("already exists", id),
                        RowError::Missing(id) => ("does not exist", id),
                    };
                    StoreError::Conflict {
                        request_id: environment_id.clone(),
                        reason: format!("variable {id} {reason}"),
                    }
                },
            ),
            _ => Err(StoreError::ModalMismatch),
        }
    }
}
