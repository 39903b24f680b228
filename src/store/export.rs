//! CSV export of stored leads

use super::StoredLead;
use crate::flow::LeadField;

/// Column order of the export. `id` and `createdAt` come from the stored
/// lead; the rest are record fields.
pub const CSV_COLUMNS: [&str; 14] = [
    "id",
    "createdAt",
    "userType",
    "name",
    "email",
    "phone",
    "childAge",
    "stemInterest",
    "parentGoal",
    "wantsDemo",
    "schoolName",
    "schoolType",
    "schoolSize",
    "schoolProgram",
];

const RECORD_COLUMNS: [LeadField; 12] = [
    LeadField::UserType,
    LeadField::Name,
    LeadField::Email,
    LeadField::Phone,
    LeadField::ChildAge,
    LeadField::StemInterest,
    LeadField::ParentGoal,
    LeadField::WantsDemo,
    LeadField::SchoolName,
    LeadField::SchoolType,
    LeadField::SchoolSize,
    LeadField::SchoolProgram,
];

/// Render leads as CSV, one row per lead in the order given.
/// Every cell is quoted; absent fields become empty cells.
pub fn to_csv(leads: &[StoredLead]) -> String {
    let mut out = CSV_COLUMNS.join(",");
    for lead in leads {
        out.push('\n');
        let mut cells = vec![quote(&lead.id), quote(&lead.created_at.to_rfc3339())];
        cells.extend(RECORD_COLUMNS.iter().map(|field| {
            lead.fields
                .get(*field)
                .map_or_else(|| quote(""), |v| quote(&v.to_string()))
        }));
        out.push_str(&cells.join(","));
    }
    out
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}
