//! Common regex patterns and keyword tables for OCR invoice extraction.
//!
//! Keyword tables are matched as lower-case substrings of a line; the
//! regexes handle the cases where word boundaries matter.

use lazy_static::lazy_static;
use regex::Regex;

/// Seller section headers across supported languages.
const SELLER_HEADERS: &str = r"sprzedawca|wystawca|dostawca|seller|vendor|supplier|lieferant|verk[äa]ufer|rechnungssteller|prod[áa]vaj[íi]c[íi]|dodavatel|s[äa]ljare|leverant[öo]r|elad[óo]|sz[áa]ll[íi]t[óo]|furnizor|v[âa]nz[ăa]tor|prestator|fornitore|venditore|leverand[øo]r";

/// Buyer section headers across supported languages.
const BUYER_HEADERS: &str = r"nabywca|odbiorca|kupuj[ąa]cy|buyer|customer|bill\s+to|ship\s+to|k[äa]ufer|rechnungsempf[äa]nger|odb[ěe]ratel|kupuj[íi]c[íi]|k[öo]pare|vev[őo]|cump[ăa]r[ăa]tor|beneficiar|acquirente|cliente|client";

/// Bare field labels that never name a party on their own.
const FIELD_LABELS: &str = r"nazwa|name|adres|address|anschrift|firma|company|dane|n[áa]zev|namn|n[ée]v|denumire|ragione\s+sociale";

/// Words that open a totals line.
pub const TOTALS_KEYWORDS: &[&str] = &[
    "razem",
    "suma",
    "total",
    "summe",
    "gesamt",
    "celkem",
    "összesen",
    "totalt",
    "summa",
    "totale",
    "do zapłaty",
    "do zaplaty",
    "to pay",
    "amount due",
    "balance due",
    "zu zahlen",
    "k úhradě",
    "k uhrade",
    "fizetendő",
    "att betala",
    "å betale",
    "de plată",
    "de plata",
    "da pagare",
];

/// Net-amount vocabulary.
pub const NET_KEYWORDS: &[&str] = &["net", "netto", "subtotal", "základ", "zaklad", "base"];

/// VAT-amount vocabulary.
pub const VAT_KEYWORDS: &[&str] = &["vat", "mwst", "tax", "moms", "dph", "áfa", "tva", "iva", "podatek"];

/// Gross-amount vocabulary.
pub const GROSS_KEYWORDS: &[&str] = &["brutto", "gross", "bruttó", "celkem s dph"];

/// Legal-form fragments that usually sit on the seller's name line.
pub const LEGAL_FORMS: &[&str] = &[
    "sp. z o.o",
    "sp.z o.o",
    "s.a.",
    "gmbh",
    "s.r.o",
    "ltd",
    "kft",
    "s.r.l",
    "srl",
    "spółka",
    "a/s",
    "oy",
    "inc.",
];

lazy_static! {
    // Monetary token: grouped thousands, plain decimals, or the OCR dash-decimal form.
    // Neighbouring characters are checked in code (the regex crate has no lookaround).
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"\d{1,3}(?:[ \u{00a0}.,']\d{3})+[.,]\d{2}|\d+[.,]\d{2}|\d+-\d{2}"
    ).unwrap();

    // Currency code or symbol written before or after an amount.
    pub static ref CURRENCY_AFFIX: Regex = Regex::new(
        r"(?i)^(?:PLN|EUR|CZK|SEK|HUF|RON|NOK|DKK|GBP|CHF|USD|US\$|zł|zl|€|£|\$)\s*|\s*(?:PLN|EUR|CZK|SEK|HUF|RON|NOK|DKK|GBP|CHF|USD|zł|zl|Kč|Ft|€|£|\$)\.?$"
    ).unwrap();

    // Decimal separator rendered as a dash before exactly two trailing digits.
    pub static ref DASH_DECIMAL: Regex = Regex::new(r"(\d)-(\d{2})$").unwrap();

    // Date spellings accepted by the normalizer.
    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})$"
    ).unwrap();

    pub static ref DATE_DMY: Regex = Regex::new(
        r"^(\d{1,2})([./\-])(\d{1,2})([./\-])(\d{4})$"
    ).unwrap();

    // Date-shaped token anywhere in a line.
    pub static ref DATE_TOKEN: Regex = Regex::new(
        r"\b(?:\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[./\-]\d{1,2}[./\-]\d{4})\b"
    ).unwrap();

    // Issue-date labels.
    pub static ref ISSUE_DATE_LABEL: Regex = Regex::new(
        r"(?i)data\s+wystawienia|data\s+faktury|invoice\s+date|date\s+of\s+issue|issue\s+date|rechnungsdatum|datum\s+vystaven[íi]|fakturadatum|data\s+emiterii|ki[áa]ll[íi]t[áa]s\s+d[áa]tuma|data\s+emissione|fakturadato"
    ).unwrap();

    // Percentage token, e.g. "23%", "23 %", "5,5%".
    pub static ref PERCENT: Regex = Regex::new(
        r"\b(\d{1,3}(?:[.,]\d{1,2})?)\s?%"
    ).unwrap();

    // Tax identifier keywords; a line carrying one is never the seller name.
    pub static ref TAX_ID: Regex = Regex::new(
        r"(?i)\b(?:NIP|VAT|REGON|KRS|BDO|USt-?IdNr|UID|DI[ČC]|I[ČC]O?|CIF|CUI|Org\.?\s*nr|P\.?IVA)\b"
    ).unwrap();

    // Totals keyword used by the totals-line scan.
    pub static ref TOTALS_WORD: Regex = Regex::new(
        r"(?i)\b(?:razem|suma|total|summe|gesamt|celkem|összesen|totalt|summa|totale)\b"
    ).unwrap();

    // Party section headers.
    pub static ref SELLER_SECTION: Regex = Regex::new(
        &format!(r"(?i)\b(?:{SELLER_HEADERS})")
    ).unwrap();

    pub static ref BUYER_SECTION: Regex = Regex::new(
        &format!(r"(?i)\b(?:{BUYER_HEADERS})")
    ).unwrap();

    // A line that is nothing but a header or field label.
    pub static ref LABEL_LINE: Regex = Regex::new(
        &format!(r"(?i)^[\s:.(\[\-]*(?:{SELLER_HEADERS}|{BUYER_HEADERS}|{FIELD_LABELS})[\s:.)\]\-]*$")
    ).unwrap();
}

/// Lower-case `line` contains any of `keywords`.
pub fn contains_any(line: &str, keywords: &[&str]) -> bool {
    let lower = line.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Number of `keywords` present in `line`.
pub fn count_keywords(line: &str, keywords: &[&str]) -> usize {
    let lower = line.to_lowercase();
    keywords.iter().filter(|k| lower.contains(*k)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_token_shapes() {
        let found: Vec<&str> = AMOUNT_TOKEN
            .find_iter("RAZEM 1 234,56 283,95")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, vec!["1 234,56", "283,95"]);

        assert!(AMOUNT_TOKEN.is_match("1234-56"));
        assert!(AMOUNT_TOKEN.is_match("1.234,56"));
    }

    #[test]
    fn test_sections() {
        assert!(SELLER_SECTION.is_match("Sprzedawca:"));
        assert!(SELLER_SECTION.is_match("Verkäufer / Seller"));
        assert!(BUYER_SECTION.is_match("Nabywca:"));
        assert!(BUYER_SECTION.is_match("Bill to"));
        assert!(!BUYER_SECTION.is_match("ABC SP. Z O.O."));
    }

    #[test]
    fn test_label_line() {
        assert!(LABEL_LINE.is_match("Sprzedawca:"));
        assert!(LABEL_LINE.is_match("  Nazwa: "));
        assert!(!LABEL_LINE.is_match("Sprzedawca: ABC SP. Z O.O."));
    }

    #[test]
    fn test_tax_id() {
        assert!(TAX_ID.is_match("NIP: 526-104-08-28"));
        assert!(TAX_ID.is_match("VAT ID DE123456789"));
        assert!(!TAX_ID.is_match("PRIVATE HOLDINGS"));
    }

    #[test]
    fn test_keyword_helpers() {
        assert!(contains_any("Razem do zapłaty", TOTALS_KEYWORDS));
        assert_eq!(count_keywords("Razem netto VAT", &["razem", "netto", "vat"]), 3);
        assert_eq!(count_keywords("Opis towaru", &["razem", "netto"]), 0);
    }
}
