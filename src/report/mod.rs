//! Report rendering.
//!
//! Turns a [`RunReport`] into the two artefacts a run leaves behind: a
//! human-readable summary rendered through a `minijinja` template and a
//! machine-readable JSON document.

use crate::migration::domain::RunReport;
use minijinja::Environment;
use thiserror::Error;

/// Errors raised while rendering a run report.
#[derive(Debug, Clone, Error)]
pub enum ReportError {
    /// The summary template failed to render.
    #[error("report template failed to render: {0}")]
    TemplateRender(String),

    /// The report could not be serialized to JSON.
    #[error("report serialization failed: {0}")]
    Serialize(String),
}

const SUMMARY_TEMPLATE: &str = r"# Migration report {{ run_id }}

Mode: {% if dry_run %}dry run (forecast){% else %}live{% endif %}
Generated: {{ generated_at }}
Export: {{ export_root }}

## Totals

- Channels processed: {{ totals.channels_processed }}
- Messages created: {{ totals.messages_created }}
- Messages failed: {{ totals.messages_failed }}
- Reactions created: {{ totals.reactions_created }}
- Reactions skipped: {{ totals.reactions_skipped }}
- Files uploaded: {{ totals.files_uploaded }}
- Users without email: {{ totals.users_without_email }}

## Channels
{% for name, channel in channels|items %}
### {{ name }} ({{ channel.outcome }})

- Attempted: {{ channel.stats.attempted_messages }}
- Created: {{ channel.stats.created_messages }}
- Failed: {{ channel.stats.failed_messages }}
- Reactions created: {{ channel.stats.reactions_created }}
- Reactions skipped: {{ channel.stats.reactions_skipped }}
- Files uploaded: {{ channel.stats.files_uploaded }}
- Member add failures: {{ channel.stats.member_add_failures }}
{% endfor %}
{%- if users_without_email %}
## Users without email
{% for user in users_without_email %}
- {{ user.id }} ({{ user.name }}){% if user.is_bot %} [bot]{% endif %}
{%- endfor %}
{% endif %}
{%- if external_identities %}
## External identities
{% for id, email in external_identities|items %}
- {{ id }}: {{ email }}
{%- endfor %}
{% endif %}
{%- if errors %}
## Errors
{% for error in errors %}
- {% if error.channel %}[{{ error.channel }}] {% endif %}{{ error.operation }}: {{ error.detail }}
{%- endfor %}
{% endif %}
## Cleanup sweep

- Spaces examined: {{ cleanup.spaces_examined }}
- Completed: {{ cleanup.completed|length }}
- Deleted: {{ cleanup.deleted|length }}
- Needing manual completion: {{ cleanup.needs_manual_completion|length }}
- Memberships reapplied: {{ cleanup.memberships_reapplied|length }}
{% if recommendations %}
## Recommendations
{% for recommendation in recommendations %}
- {{ recommendation.subject }}: {{ recommendation.action }}
{%- endfor %}
{% endif %}";

/// Renders the human-readable summary for a run.
///
/// # Errors
///
/// Returns [`ReportError::TemplateRender`] when the template cannot be
/// rendered over the report.
pub fn render_summary(report: &RunReport) -> Result<String, ReportError> {
    let environment = Environment::new();
    environment
        .render_str(SUMMARY_TEMPLATE, report)
        .map_err(|error| ReportError::TemplateRender(error.to_string()))
}

/// Renders the machine-readable JSON document for a run.
///
/// # Errors
///
/// Returns [`ReportError::Serialize`] when the report cannot be serialized.
pub fn render_json(report: &RunReport) -> Result<String, ReportError> {
    serde_json::to_string_pretty(report).map_err(|error| ReportError::Serialize(error.to_string()))
}

#[cfg(test)]
mod tests;
