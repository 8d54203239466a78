use std::collections::HashMap;

use crate::model::EntryKind;

/// Raw "Puantaj Kaydı Türü" text as exported by the payroll system, mapped to
/// its canonical kind. Matching is exact on the trimmed cell text.
const ENTRY_TYPE_TABLE: &[(&str, EntryKind)] = &[
    ("ŞEHİRDIŞI", EntryKind::OnSite),
    ("ŞEHİRDIŞI GİDİŞ", EntryKind::Travel),
    ("BEKLEME", EntryKind::Standby),
    ("YILLIK İZİN", EntryKind::AnnualLeave),
    ("PROJE ARASI İZNİ", EntryKind::InterProjectLeave),
    ("İSTİRAHAT RAPORU", EntryKind::SickLeave),
    ("EĞİTİM", EntryKind::Training),
    ("HAFTA TATİLİ", EntryKind::DayOff),
    ("RESMİ TATİL", EntryKind::DayOff),
    ("HAFTAİÇİ TATİL", EntryKind::DayOff),
    ("BABALIK İZNİ", EntryKind::PaternityLeave),
    ("OFİSTE", EntryKind::Office),
];

/// Raw "Res Montaj Tipi" slot text mapped to the display label used in
/// reports. Unlisted text falls back to the raw value unchanged.
const WORK_TYPE_LABEL_TABLE: &[(&str, &str)] = &[
    ("A-OFFLOADING (İNDİRME)", "İndirme / Boşaltma"),
    ("B-PREPERATION (HAZIRLIK)", "Hazırlık"),
    ("C-PRE ASSEMBLY (ÖN DİKİM)", "Ön Dikim / Ön Montaj"),
    ("D-MAİN ASSEMBLY (ANA MONTAJ)", "Ana Montaj (Kaldırma)"),
    ("E-TORQUE WORKS (TORK İŞLERİ)", "Tork İşleri"),
    ("EF-FINISHING WORKS (ELEKTRİK İŞLERİ)", "Elektrik Bitirme İşleri"),
    ("F-FIELD ORGANISATION", "Saha Organizasyonu"),
    ("G-NON-PRODUCTIVE (ATIL İŞLER)", "Atıl / Verimsiz"),
    ("I-PUNCH CLOSING", "Punch Liste Kapama"),
    ("K-WAITING (BEKLEMELER)", "Bekleme"),
    ("KH-WAITING (HAREKET)", "Hareket Bekleme"),
    ("L-EXTRA WORKS", "Ekstra İşler"),
    ("M-TRAINING (EĞİTİM)", "Eğitim"),
    ("MF-MECHANICAL FINISHING", "Mekanik Bitirme"),
    ("N-İDARİ İŞLER", "İdari İşler"),
    ("Y-YOL", "Yol / Seyahat"),
    ("PROJE ARASI", "Proje Arası"),
    ("DAY OFF", "İzin Günü"),
];

/// Immutable vocabulary tables owned by the normalizer. The default instance
/// carries the Turkish payroll vocabulary; a differently-localized export can
/// supply its own tables without touching the normalization logic.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entry_types: HashMap<&'static str, EntryKind>,
    work_type_labels: HashMap<&'static str, &'static str>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            entry_types: ENTRY_TYPE_TABLE.iter().copied().collect(),
            work_type_labels: WORK_TYPE_LABEL_TABLE.iter().copied().collect(),
        }
    }
}

impl Vocabulary {
    /// Exact-match lookup of the raw entry-type text. `None` means the text is
    /// not part of the known vocabulary and the row should be classified as
    /// [`EntryKind::Unclassified`].
    pub fn entry_kind(&self, raw: &str) -> Option<EntryKind> {
        self.entry_types.get(raw).copied()
    }

    /// Display label for a raw work-type string, falling back to the raw text
    /// itself so a label is never blank for non-empty input.
    pub fn work_type_label<'a>(&self, raw: &'a str) -> &'a str {
        self.work_type_labels.get(raw).copied().unwrap_or(raw)
    }
}

/// Work-type code: everything before the first `-`, trimmed and upper-cased.
/// Empty input yields an empty code.
pub fn work_type_code(raw: &str) -> String {
    raw.split('-')
        .next()
        .unwrap_or("")
        .trim()
        .to_uppercase()
}
