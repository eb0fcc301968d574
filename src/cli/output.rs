//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::address::{AddressDefinition, Phase};
use crate::config::ValidationResult;
use crate::plans::AddressTypeSummary;
use crate::readiness::StatusReport;
use crate::reconciler::Notification;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Address row for table display.
#[derive(Tabled)]
struct AddressRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Type")]
    address_type: String,
    #[tabled(rename = "Plan")]
    plan: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Broker")]
    broker: String,
}

/// Plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Type")]
    address_type: String,
    #[tabled(rename = "Plan")]
    name: String,
    #[tabled(rename = "Display Name")]
    display_name: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a list of addresses for display.
    #[must_use]
    pub fn format_addresses(&self, addresses: &[AddressDefinition]) -> String {
        match self.format {
            OutputFormat::Json => to_json(&addresses),
            OutputFormat::Text => Self::format_addresses_text(addresses),
        }
    }

    fn format_addresses_text(addresses: &[AddressDefinition]) -> String {
        if addresses.is_empty() {
            return format!("{} No addresses defined.\n", "-".dimmed());
        }

        let rows: Vec<AddressRow> = addresses
            .iter()
            .map(|a| AddressRow {
                address: a.address.clone(),
                address_type: a.address_type.clone(),
                plan: a.plan.clone(),
                phase: Self::format_phase(a.status.as_ref().and_then(|s| s.phase.as_ref())),
                ready: if a.status.as_ref().is_some_and(|s| s.is_ready) {
                    "yes".green().to_string()
                } else {
                    "no".yellow().to_string()
                },
                broker: a.allocated_to.clone().unwrap_or_else(|| String::from("-")),
            })
            .collect();

        let mut output = Table::new(rows).to_string();
        let _ = write!(output, "\n\n{} addresses\n", addresses.len());
        output
    }

    /// Formats a change notification for display.
    #[must_use]
    pub fn format_notification(&self, notification: &Notification) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(notification).unwrap_or_default(),
            OutputFormat::Text => {
                let (label, observed_at) = match notification {
                    Notification::AddressesDefined { observed_at, .. } => {
                        ("defined".cyan(), observed_at)
                    }
                    Notification::AddressesReady { observed_at, .. } => ("ready".green(), observed_at),
                };
                format!(
                    "[{}] {label}: {} addresses, changed {}",
                    observed_at.format("%H:%M:%S"),
                    notification.addresses().len(),
                    notification.description()
                )
            }
        }
    }

    /// Formats the address types of a plan for display.
    #[must_use]
    pub fn format_address_types(&self, types: &[AddressTypeSummary]) -> String {
        match self.format {
            OutputFormat::Json => to_json(&types),
            OutputFormat::Text => {
                let rows: Vec<PlanRow> = types
                    .iter()
                    .flat_map(|t| {
                        t.plans.iter().map(|p| PlanRow {
                            address_type: t.name.clone(),
                            name: p.name.clone(),
                            display_name: p.display_name.clone(),
                            description: Self::truncate(p.short_description.as_deref().unwrap_or(""), 50),
                        })
                    })
                    .collect();
                if rows.is_empty() {
                    return format!("{} No address plans available.\n", "-".dimmed());
                }
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats the result of a readiness check for display.
    #[must_use]
    pub fn format_status_report(&self, report: &StatusReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Text => {
                if report.total() == 0 {
                    return format!("{} No readiness changes.\n", "✓".green());
                }
                format!(
                    "Status check: {} updated, {} unchanged, {} failed\n",
                    report.updated.to_string().green(),
                    report.unchanged.to_string().dimmed(),
                    report.failed.to_string().red()
                )
            }
        }
    }

    /// Formats a validation result for display.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        let warnings: &[String] = if show_warnings { &result.warnings } else { &[] };
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "valid": true,
                "warnings": warnings,
            })),
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());
                if !warnings.is_empty() {
                    output.push_str("\nWarnings:\n");
                    for warning in warnings {
                        let _ = writeln!(output, "  {} {warning}", "⚠".yellow());
                    }
                }
                output
            }
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({ "status": "success", "message": message })),
            OutputFormat::Text => format!("{} {message}", "✓".green()),
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({ "status": "error", "message": message })),
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Formats a phase with color.
    fn format_phase(phase: Option<&Phase>) -> String {
        match phase {
            Some(Phase::Active) => "Active".green().to_string(),
            Some(Phase::Configuring) => "Configuring".cyan().to_string(),
            Some(Phase::Pending) => "Pending".yellow().to_string(),
            Some(Phase::Failed) => "Failed".red().to_string(),
            Some(Phase::Terminating) => "Terminating".dimmed().to_string(),
            Some(Phase::Other(other)) => other.clone(),
            None => "-".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressStatus;
    use crate::plans::PlanSummary;

    fn addresses() -> Vec<AddressDefinition> {
        let mut active = AddressDefinition::new("q1", "queue", "small");
        active.status = Some(AddressStatus {
            is_ready: true,
            phase: Some(Phase::Active),
            message: None,
        });
        vec![active, AddressDefinition::new("t1", "topic", "pooled")]
    }

    #[test]
    fn test_format_addresses_json() {
        let output = OutputFormatter::new(OutputFormat::Json).format_addresses(&addresses());
        let parsed: Vec<AddressDefinition> = serde_json::from_str(&output).expect("valid json");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].address, "q1");
    }

    #[test]
    fn test_format_addresses_text() {
        let output = OutputFormatter::new(OutputFormat::Text).format_addresses(&addresses());
        assert!(output.contains("q1"));
        assert!(output.contains("pooled"));
        assert!(output.contains("2 addresses"));
    }

    #[test]
    fn test_format_address_types() {
        let types = vec![AddressTypeSummary {
            name: String::from("queue"),
            plans: vec![PlanSummary {
                name: String::from("small-queue"),
                display_name: String::from("Small Queue"),
                short_description: Some("x".repeat(80)),
                long_description: None,
            }],
        }];
        let output = OutputFormatter::new(OutputFormat::Text).format_address_types(&types);
        assert!(output.contains("Small Queue"));
        assert!(output.contains("..."));
    }

    #[test]
    fn test_format_status_report_json() {
        let report = StatusReport {
            updated: 2,
            unchanged: 0,
            failed: 1,
        };
        let output = OutputFormatter::new(OutputFormat::Json).format_status_report(&report);
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["updated"], 2);
        assert_eq!(value["failed"], 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghij", 6), "abc...");
    }
}
