use crate::config::Config;
use anyhow::{Context, Result};

/// Instructions sent alongside every document unless `gemini.instructions_file` is set.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are filing scanned documents so they are easy to find later.
Read the attached document and return JSON with exactly these fields:

summary
  One or two sentences saying what the document is, who produced it and for whom.
  Example: "Medical invoice from Dr. Smith for services provided to John Doe in October 2024."

keywords
  Up to 10 search terms as a single comma-separated string, the words someone would type
  to find this document. Example: "Invoice, Medical, Smith, October, 2024, John Doe, Bill"

title
  A short, clear label. Example: "Medical Invoice - Dr. Smith - John Doe - Oct 2024"

filename
  A name following this pattern exactly:

    [Date]_[Category]_[Source]_[Description]_[Details].pdf

  Date: the date printed on the document, always first.
    - Day, month and year known: YYYYMMDD (20250105)
    - Day missing: YYYYMM00 (20250100)
    - Only the year known: YYYY0000 (20250000)
    - Month and day known but no year anywhere: 0000MMDD (00000315). Last resort only.
    When unsure, use the least specific date you are certain of.
  Category: one short word grouping similar files, e.g. Medical, Financial, Insurance,
    Vehicle, Legal.
  Source: who sent or created it, e.g. CityHall, DrJones, AcmeCorp, Internal.
  Description: what the document is, e.g. Invoice, Report, Statement, Agreement, Form.
  Details: only when needed to tell similar files apart; join words with hyphens,
    e.g. Patient-Johnson, Account-12345. Omit the section (and its underscore) otherwise.

  Separate sections with a single underscore, use no spaces, and always end with .pdf.

  Examples:
    20250310_Financial_MyBank_Statement_Savings-Account.pdf
    20250100_Financial_BankABC_Statement_Checking.pdf
    20250000_Legal_LawFirmXYZ_Contract_VendorAgreement.pdf
"#;

pub fn load_instructions(cfg: &Config) -> Result<String> {
    let path = cfg.gemini.instructions_file.trim();
    if path.is_empty() {
        return Ok(DEFAULT_INSTRUCTIONS.to_string());
    }
    std::fs::read_to_string(path).with_context(|| format!("reading instructions file: {path}"))
}
