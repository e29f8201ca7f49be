use crate::error::{BomSyncError, BomSyncResult};
use bomsync_models::Bom;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

pub fn validate_model<T: Validate>(model: &T) -> BomSyncResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let error_messages = format_validation_errors(&errors);
            Err(BomSyncError::validation("model", error_messages))
        }
    }
}

/// Flattens nested validation errors into `path: message` pairs, e.g.
/// `items[2].qty: Quantity must not be negative`.
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_messages("", errors, &mut messages);
    messages.sort();
    messages.join(", ")
}

fn collect_messages(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = match &error.message {
                        Some(message) => message.to_string(),
                        None => match error.code.as_ref() {
                            "length" => "length validation failed".to_string(),
                            "range" => "value out of range".to_string(),
                            "required" => "field is required".to_string(),
                            code => format!("validation failed: {}", code),
                        },
                    };
                    out.push(format!("{}: {}", path, message));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(&path, nested, out),
            ValidationErrorsKind::List(entries) => {
                for (index, nested) in entries {
                    collect_messages(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

/// Checks an inbound template BOM before it is used as a sync source.
pub fn validate_template_document(doc: &Bom) -> BomSyncResult<()> {
    if let Err(errors) = doc.validate() {
        return Err(BomSyncError::validation(
            doc.name.clone(),
            format_validation_errors(&errors),
        ));
    }

    if doc.items.iter().any(|line| !line.qty.is_finite() || !line.rate.is_finite()) {
        return Err(BomSyncError::validation(
            doc.name.clone(),
            "Quantity and rate must be finite numbers",
        ));
    }

    Ok(())
}
