use crate::db::DatabaseError;

use super::enums::{str_enum, ReportCategory};

str_enum!(
    /// Fixed vocabulary of lab tests the normalizer can produce.
    /// A raw name that maps to none of these is UNKNOWN and never stored.
    CanonicalTest {
        // CBC
        HemoglobinCbc => "HEMOGLOBIN_CBC",
        RbcCount => "RBC_COUNT",
        WbcCount => "WBC_COUNT",
        PlateletCount => "PLATELET_COUNT",
        Hematocrit => "HEMATOCRIT",
        Mcv => "MCV",
        Mch => "MCH",
        Mchc => "MCHC",
        Rdw => "RDW",
        Mpv => "MPV",
        Pdw => "PDW",
        Pct => "PCT",
        Neutrophils => "NEUTROPHILS",
        Lymphocytes => "LYMPHOCYTES",
        Monocytes => "MONOCYTES",
        Eosinophils => "EOSINOPHILS",
        Basophils => "BASOPHILS",
        Esr => "ESR",
        // Liver
        Alt => "ALT",
        Ast => "AST",
        Alp => "ALP",
        Ggt => "GGT",
        BilirubinTotal => "BILIRUBIN_TOTAL",
        BilirubinDirect => "BILIRUBIN_DIRECT",
        BilirubinIndirect => "BILIRUBIN_INDIRECT",
        Albumin => "ALBUMIN",
        TotalProtein => "TOTAL_PROTEIN",
        Globulin => "GLOBULIN",
        // Kidney and electrolytes
        Creatinine => "CREATININE",
        Bun => "BUN",
        Urea => "UREA",
        Egfr => "EGFR",
        UricAcid => "URIC_ACID",
        Sodium => "SODIUM",
        Potassium => "POTASSIUM",
        Chloride => "CHLORIDE",
        Calcium => "CALCIUM",
        Phosphorus => "PHOSPHORUS",
        // Thyroid
        Tsh => "TSH",
        T3Total => "T3_TOTAL",
        T4Total => "T4_TOTAL",
        FreeT3 => "FREE_T3",
        FreeT4 => "FREE_T4",
        // Lipid
        TotalCholesterol => "TOTAL_CHOLESTEROL",
        LdlCholesterol => "LDL_CHOLESTEROL",
        HdlCholesterol => "HDL_CHOLESTEROL",
        VldlCholesterol => "VLDL_CHOLESTEROL",
        Triglycerides => "TRIGLYCERIDES",
        // Diabetes
        GlucoseFasting => "GLUCOSE_FASTING",
        GlucoseRandom => "GLUCOSE_RANDOM",
        GlucosePp => "GLUCOSE_PP",
        Hba1c => "HBA1C",
        AverageBloodGlucose => "AVERAGE_BLOOD_GLUCOSE",
        // Vitamins, iron studies, inflammation
        VitaminD => "VITAMIN_D",
        VitaminB12 => "VITAMIN_B12",
        Iron => "IRON",
        Ferritin => "FERRITIN",
        Tibc => "TIBC",
        Crp => "CRP",
    }
);

impl CanonicalTest {
    pub fn category(&self) -> ReportCategory {
        use CanonicalTest::*;
        match self {
            HemoglobinCbc | RbcCount | WbcCount | PlateletCount | Hematocrit | Mcv | Mch
            | Mchc | Rdw | Mpv | Pdw | Pct | Neutrophils | Lymphocytes | Monocytes
            | Eosinophils | Basophils | Esr => ReportCategory::Cbc,
            Alt | Ast | Alp | Ggt | BilirubinTotal | BilirubinDirect | BilirubinIndirect
            | Albumin | TotalProtein | Globulin => ReportCategory::Liver,
            Creatinine | Bun | Urea | Egfr | UricAcid | Sodium | Potassium | Chloride
            | Calcium | Phosphorus => ReportCategory::Kidney,
            Tsh | T3Total | T4Total | FreeT3 | FreeT4 => ReportCategory::Thyroid,
            TotalCholesterol | LdlCholesterol | HdlCholesterol | VldlCholesterol
            | Triglycerides => ReportCategory::Lipid,
            GlucoseFasting | GlucoseRandom | GlucosePp | Hba1c | AverageBloodGlucose => {
                ReportCategory::Diabetes
            }
            VitaminD | VitaminB12 | Iron | Ferritin | Tibc | Crp => ReportCategory::Other,
        }
    }

    /// Lenient id lookup used for query input: "hemoglobin cbc" → HEMOGLOBIN_CBC.
    pub fn from_loose_id(text: &str) -> Option<CanonicalTest> {
        let id = text.trim().to_uppercase().replace([' ', '-'], "_");
        id.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn vocabulary_size() {
        assert_eq!(CanonicalTest::ALL.len(), 59);
    }

    #[test]
    fn every_category_has_members() {
        for category in ReportCategory::ALL {
            assert!(
                CanonicalTest::ALL.iter().any(|t| t.category() == *category),
                "no tests in {category}"
            );
        }
    }

    #[test]
    fn categories_of_ambiguous_neighbours() {
        assert_eq!(CanonicalTest::HemoglobinCbc.category(), ReportCategory::Cbc);
        assert_eq!(CanonicalTest::Hba1c.category(), ReportCategory::Diabetes);
        assert_eq!(CanonicalTest::Sodium.category(), ReportCategory::Kidney);
        assert_eq!(CanonicalTest::Crp.category(), ReportCategory::Other);
    }

    #[test]
    fn parses_ids() {
        assert_eq!(
            CanonicalTest::from_str("FREE_T4").unwrap(),
            CanonicalTest::FreeT4
        );
        assert!(CanonicalTest::from_str("UNKNOWN").is_err());
    }

    #[test]
    fn loose_id_accepts_spaces_and_case() {
        assert_eq!(
            CanonicalTest::from_loose_id(" hemoglobin cbc "),
            Some(CanonicalTest::HemoglobinCbc)
        );
        assert_eq!(CanonicalTest::from_loose_id("Hemoglobin"), None);
    }
}
