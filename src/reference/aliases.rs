use std::collections::HashMap;

use crate::models::CanonicalTest;
use crate::models::CanonicalTest::*;

/// Substrings that force HBA1C before any alias lookup, so "Glycated
/// Hemoglobin" never lands on HEMOGLOBIN_CBC.
pub const HBA1C_KEYWORDS: &[&str] = &["HBA1C", "A1C", "GLYCATED", "GLYCOSYLATED", "GLYCOHEMOGLOBIN"];

/// Derived lipid values that embed another test's alias ("NON-HDL
/// CHOLESTEROL", "CHOLESTEROL/HDL RATIO"). Names containing one of these,
/// after hyphens become spaces, never partially match.
pub const DERIVED_NAME_MARKERS: &[&str] = &["NON HDL", "NONHDL", "/HDL"];

/// Uppercase OCR spellings seen on Indian and international lab reports.
/// Order matters only among equal-length aliases during partial matching.
const BUILTIN_ALIASES: &[(&str, CanonicalTest)] = &[
    ("HEMOGLOBIN", HemoglobinCbc),
    ("HB", HemoglobinCbc),
    ("HGB", HemoglobinCbc),
    ("HAEMOGLOBIN", HemoglobinCbc),
    ("HB%", HemoglobinCbc),
    ("HAEMOGLOBIN HB", HemoglobinCbc),
    ("HEMOGLOBIN (HB)", HemoglobinCbc),
    ("HB (HEMOGLOBIN)", HemoglobinCbc),

    ("HBA1C", Hba1c),
    ("A1C", Hba1c),
    ("GLYCATED HEMOGLOBIN", Hba1c),
    ("GLYCOSYLATED HEMOGLOBIN", Hba1c),
    ("HEMOGLOBIN A1C", Hba1c),
    ("HB A1C", Hba1c),
    ("GLYCATED HAEMOGLOBIN", Hba1c),
    ("GLYCOSYLATED HAEMOGLOBIN", Hba1c),
    ("GLYCOHEMOGLOBIN", Hba1c),
    ("HBA1C (GLYCATED HEMOGLOBIN)", Hba1c),

    ("RBC", RbcCount),
    ("R.B.C", RbcCount),
    ("RBC COUNT", RbcCount),
    ("RED BLOOD CELL", RbcCount),
    ("RED BLOOD CELLS", RbcCount),
    ("ERYTHROCYTES", RbcCount),
    ("TOTAL RBC COUNT", RbcCount),
    ("RED CELL COUNT", RbcCount),
    ("ERYTHROCYTE COUNT", RbcCount),
    ("RED BLOOD CELL COUNT", RbcCount),

    ("WBC", WbcCount),
    ("W.B.C", WbcCount),
    ("WBC COUNT", WbcCount),
    ("TLC", WbcCount),
    ("TOTAL LEUCOCYTE COUNT", WbcCount),
    ("TOTAL LEUKOCYTE COUNT", WbcCount),
    ("WHITE BLOOD CELL", WbcCount),
    ("WHITE BLOOD CELLS", WbcCount),
    ("LEUKOCYTES", WbcCount),
    ("LEUCOCYTES", WbcCount),
    ("WHITE CELL COUNT", WbcCount),
    ("TOTAL WBC", WbcCount),
    ("TC", WbcCount),
    ("TOTAL LEUKOCYTE COUNT (TC)", WbcCount),
    ("WHITE BLOOD CELL COUNT", WbcCount),

    ("PLATELET", PlateletCount),
    ("PLATELET COUNT", PlateletCount),
    ("PLATELETS", PlateletCount),
    ("PLT", PlateletCount),
    ("PLTS", PlateletCount),
    ("THROMBOCYTE", PlateletCount),
    ("THROMBOCYTES", PlateletCount),
    ("PLATELET COUNT PLT", PlateletCount),

    ("HCT", Hematocrit),
    ("HEMATOCRIT", Hematocrit),
    ("HAEMATOCRIT", Hematocrit),
    ("PCV", Hematocrit),
    ("PACKED CELL VOLUME", Hematocrit),
    ("HEMATOCRIT VALUE", Hematocrit),
    ("HCT VALUE", Hematocrit),
    ("PCV HCT", Hematocrit),
    ("PACKED CELL VOLUME(PCV)/HAEMATOCRIT", Hematocrit),
    ("PACKED CELL VOLUME (PCV)", Hematocrit),

    ("MCV", Mcv),
    ("MEAN CORPUSCULAR VOLUME", Mcv),
    ("MEAN CELL VOLUME", Mcv),
    ("MEAN CORPUSCULAR VOLUME(MCV)", Mcv),
    ("MEAN CORPUSCULAR VOLUME (MCV)", Mcv),

    ("MCH", Mch),
    ("MEAN CORPUSCULAR HEMOGLOBIN", Mch),
    ("MEAN CORPUSCULAR HAEMOGLOBIN", Mch),
    ("MEAN CELL HEMOGLOBIN", Mch),
    ("MEAN CELL HAEMOGLOBIN", Mch),
    ("MEAN CORPUSCULAR HAEMOGLOBIN(MCH)", Mch),
    ("MEAN CORPUSCULAR HEMOGLOBIN(MCH)", Mch),
    ("MCH (MEAN CORPUSCULAR HB)", Mch),

    ("MCHC", Mchc),
    ("MEAN CORPUSCULAR HB CONC", Mchc),
    ("MEAN CORPUSCULAR HEMOGLOBIN CONCENTRATION", Mchc),
    ("MEAN CORPUSCULAR HAEMOGLOBIN CONCENTRATION", Mchc),
    ("MEAN CELL HB CONC", Mchc),
    ("MEAN CELL HAEMOGLOBIN CON", Mchc),
    ("MEAN CORPUSCULAR HAEMOGLOBINCONCENTRATION(MCHC)", Mchc),

    ("RDW", Rdw),
    ("RDW CV", Rdw),
    ("RDW-CV", Rdw),
    ("RED CELL DISTRIBUTION WIDTH", Rdw),
    ("RED CELL DISTRIBUTION WIDTH CV", Rdw),
    ("RDW SD", Rdw),
    ("RDW-SD", Rdw),

    ("MPV", Mpv),
    ("MEAN PLATELET VOLUME", Mpv),

    ("PDW", Pdw),
    ("PLATELET DISTRIBUTION WIDTH", Pdw),

    ("PCT", Pct),
    ("PLATELETCRIT", Pct),

    ("NEUTROPHIL", Neutrophils),
    ("NEUTROPHILS", Neutrophils),
    ("NEUT", Neutrophils),
    ("SEGMENTED NEUTROPHILS", Neutrophils),
    ("POLYMORPHS", Neutrophils),
    ("ABSOLUTE NEUTROPHILS", Neutrophils),
    ("ABSOLUTE NEUTROPHIL COUNT", Neutrophils),

    ("LYMPHOCYTE", Lymphocytes),
    ("LYMPHOCYTES", Lymphocytes),
    ("LYMPH", Lymphocytes),
    ("ABSOLUTE LYMPHOCYTES", Lymphocytes),
    ("ABSOLUTE LYMPHOCYTE COUNT", Lymphocytes),

    ("MONOCYTE", Monocytes),
    ("MONOCYTES", Monocytes),
    ("MONO", Monocytes),
    ("ABSOLUTE MONOCYTES", Monocytes),
    ("ABSOLUTE MONOCYTE COUNT", Monocytes),

    ("EOSINOPHIL", Eosinophils),
    ("EOSINOPHILS", Eosinophils),
    ("EOS", Eosinophils),
    ("ABSOLUTE EOSINOPHILS", Eosinophils),
    ("ABSOLUTE EOSINOPHIL COUNT", Eosinophils),

    ("BASOPHIL", Basophils),
    ("BASOPHILS", Basophils),
    ("BASO", Basophils),
    ("ABSOLUTE BASOPHILS", Basophils),
    ("ABSOLUTE BASOPHIL COUNT", Basophils),

    ("ESR", Esr),
    ("ERYTHROCYTE SEDIMENTATION RATE", Esr),
    ("ESR WESTERGREN", Esr),
    ("ESR WESTERGREN METHOD", Esr),
    ("SEDIMENTATION RATE", Esr),
    ("ESR AUTOMATED", Esr),

    ("ALT", Alt),
    ("SGPT", Alt),
    ("ALANINE AMINOTRANSFERASE", Alt),
    ("ALANINE TRANSAMINASE", Alt),
    ("ALT (SGPT)", Alt),
    ("SGPT (ALT)", Alt),
    ("ALANINE AMINOTRANSFERASE (ALT)", Alt),

    ("AST", Ast),
    ("SGOT", Ast),
    ("ASPARTATE AMINOTRANSFERASE", Ast),
    ("ASPARTATE TRANSAMINASE", Ast),
    ("AST (SGOT)", Ast),
    ("SGOT (AST)", Ast),
    ("ASPARTATE AMINOTRANSFERASE (AST)", Ast),

    ("ALP", Alp),
    ("ALKALINE PHOSPHATASE", Alp),
    ("ALK PHOS", Alp),
    ("ALKALINE PHOSPHATASE (ALP)", Alp),

    ("GGT", Ggt),
    ("GAMMA GT", Ggt),
    ("GAMMA GLUTAMYL TRANSFERASE", Ggt),

    ("BILIRUBIN TOTAL", BilirubinTotal),
    ("TOTAL BILIRUBIN", BilirubinTotal),
    ("BILIRUBIN", BilirubinTotal),
    ("T. BILIRUBIN", BilirubinTotal),
    ("BILIRUBIN (TOTAL)", BilirubinTotal),

    ("BILIRUBIN DIRECT", BilirubinDirect),
    ("DIRECT BILIRUBIN", BilirubinDirect),
    ("D. BILIRUBIN", BilirubinDirect),
    ("CONJUGATED BILIRUBIN", BilirubinDirect),

    ("BILIRUBIN INDIRECT", BilirubinIndirect),
    ("INDIRECT BILIRUBIN", BilirubinIndirect),
    ("UNCONJUGATED BILIRUBIN", BilirubinIndirect),

    ("ALBUMIN", Albumin),
    ("SERUM ALBUMIN", Albumin),
    ("ALB", Albumin),

    ("TOTAL PROTEIN", TotalProtein),
    ("PROTEIN TOTAL", TotalProtein),
    ("SERUM PROTEIN", TotalProtein),

    ("GLOBULIN", Globulin),
    ("SERUM GLOBULIN", Globulin),

    ("CREATININE", Creatinine),
    ("SERUM CREATININE", Creatinine),
    ("CREAT", Creatinine),
    ("CREATININE,SERUM", Creatinine),
    ("CREATININE SERUM", Creatinine),

    ("BUN", Bun),
    ("BLOOD UREA NITROGEN", Bun),

    ("UREA", Urea),
    ("BLOOD UREA", Urea),
    ("UREA,SERUM", Urea),
    ("UREA SERUM", Urea),

    ("EGFR", Egfr),
    ("GFR", Egfr),
    ("ESTIMATED GFR", Egfr),
    ("ESTIMATED GLOMERULAR FILTRATION RATE", Egfr),

    ("URIC ACID", UricAcid),
    ("SERUM URIC ACID", UricAcid),

    ("SODIUM", Sodium),
    ("NA", Sodium),
    ("SERUM SODIUM", Sodium),
    ("NA+", Sodium),

    ("POTASSIUM", Potassium),
    ("K", Potassium),
    ("SERUM POTASSIUM", Potassium),
    ("K+", Potassium),

    ("CHLORIDE", Chloride),
    ("CL", Chloride),
    ("SERUM CHLORIDE", Chloride),
    ("CL-", Chloride),

    ("CALCIUM", Calcium),
    ("CA", Calcium),
    ("SERUM CALCIUM", Calcium),
    ("CA++", Calcium),

    ("PHOSPHORUS", Phosphorus),
    ("PHOSPHATE", Phosphorus),
    ("SERUM PHOSPHORUS", Phosphorus),

    ("TSH", Tsh),
    ("THYROID STIMULATING HORMONE", Tsh),
    ("TSH 3RD GENERATION", Tsh),
    ("TSH ULTRASENSITIVE", Tsh),
    ("TSH (3RD GENERATION)", Tsh),

    ("T3", T3Total),
    ("T3 TOTAL", T3Total),
    ("TOTAL T3", T3Total),
    ("TRIIODOTHYRONINE", T3Total),
    ("T3 (TRIIODOTHYRONINE)", T3Total),

    ("T4", T4Total),
    ("T4 TOTAL", T4Total),
    ("TOTAL T4", T4Total),
    ("THYROXINE", T4Total),
    ("T4 (THYROXINE)", T4Total),

    ("FREE T3", FreeT3),
    ("FT3", FreeT3),
    ("F.T3", FreeT3),

    ("FREE T4", FreeT4),
    ("FT4", FreeT4),
    ("F.T4", FreeT4),
    ("FREE THYROXINE", FreeT4),
    ("FREE THYROXINE (FT4)", FreeT4),

    ("CHOLESTEROL", TotalCholesterol),
    ("TOTAL CHOLESTEROL", TotalCholesterol),
    ("SERUM CHOLESTEROL", TotalCholesterol),
    ("CHOLESTEROL TOTAL", TotalCholesterol),

    ("LDL", LdlCholesterol),
    ("LDL CHOLESTEROL", LdlCholesterol),
    ("LDL-C", LdlCholesterol),
    ("LOW DENSITY LIPOPROTEIN", LdlCholesterol),

    ("HDL", HdlCholesterol),
    ("HDL CHOLESTEROL", HdlCholesterol),
    ("HDL-C", HdlCholesterol),
    ("HIGH DENSITY LIPOPROTEIN", HdlCholesterol),

    ("TRIGLYCERIDES", Triglycerides),
    ("TRIGLYCERIDE", Triglycerides),
    ("TG", Triglycerides),
    ("SERUM TRIGLYCERIDES", Triglycerides),

    ("VLDL", VldlCholesterol),
    ("VLDL CHOLESTEROL", VldlCholesterol),
    ("VLDL-C", VldlCholesterol),

    ("GLUCOSE FASTING", GlucoseFasting),
    ("FASTING GLUCOSE", GlucoseFasting),
    ("FBS", GlucoseFasting),
    ("FASTING BLOOD SUGAR", GlucoseFasting),
    ("BLOOD SUGAR FASTING", GlucoseFasting),
    ("FPG", GlucoseFasting),
    ("FASTING PLASMA GLUCOSE", GlucoseFasting),

    ("GLUCOSE RANDOM", GlucoseRandom),
    ("RANDOM GLUCOSE", GlucoseRandom),
    ("RBS", GlucoseRandom),
    ("RANDOM BLOOD SUGAR", GlucoseRandom),
    ("GLUCOSE,RANDOM", GlucoseRandom),
    ("GLUCOSE", GlucoseRandom),

    ("GLUCOSE PP", GlucosePp),
    ("PPBS", GlucosePp),
    ("POST PRANDIAL BLOOD SUGAR", GlucosePp),
    ("POST PRANDIAL GLUCOSE", GlucosePp),
    ("PP GLUCOSE", GlucosePp),

    ("AVERAGE BLOOD GLUCOSE", AverageBloodGlucose),
    ("ABG", AverageBloodGlucose),
    ("AVERAGE BLOOD GLUCOSE (ABG)", AverageBloodGlucose),
    ("ESTIMATED AVERAGE GLUCOSE", AverageBloodGlucose),
    ("EAG", AverageBloodGlucose),

    ("VITAMIN D", VitaminD),
    ("VIT D", VitaminD),
    ("25-HYDROXY VITAMIN D", VitaminD),
    ("25 OH VITAMIN D", VitaminD),

    ("VITAMIN B12", VitaminB12),
    ("VIT B12", VitaminB12),
    ("CYANOCOBALAMIN", VitaminB12),

    ("IRON", Iron),
    ("SERUM IRON", Iron),

    ("FERRITIN", Ferritin),
    ("SERUM FERRITIN", Ferritin),

    ("TIBC", Tibc),
    ("TOTAL IRON BINDING CAPACITY", Tibc),

    ("CRP", Crp),
    ("C-REACTIVE PROTEIN", Crp),
    ("HS-CRP", Crp),
    ("HIGH SENSITIVITY CRP", Crp),
];

/// Alias lookup shared by the resolver and the query compiler.
///
/// Keys are stored uppercased and trimmed. Insertion order is kept so that
/// the longest-first view is deterministic for aliases of equal length.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: Vec<(String, CanonicalTest)>,
    index: HashMap<String, usize>,
    longest_first: Vec<usize>,
}

impl AliasTable {
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_ALIASES.iter().map(|(alias, test)| (alias.to_string(), *test)))
    }

    /// Build from `(alias, test)` pairs. A repeated alias keeps its first
    /// position and takes the last target.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, CanonicalTest)>,
    {
        let mut table = Self {
            entries: Vec::new(),
            index: HashMap::new(),
            longest_first: Vec::new(),
        };
        for (alias, test) in entries {
            table.insert(&alias, test);
        }
        table.reorder();
        table
    }

    /// Builtin aliases with `overrides` merged on top.
    pub fn with_overrides<I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, CanonicalTest)>,
    {
        let mut table = self.clone();
        for (alias, test) in overrides {
            table.insert(&alias, test);
        }
        table.reorder();
        table
    }

    fn insert(&mut self, alias: &str, test: CanonicalTest) {
        let key = alias.trim().to_uppercase();
        if key.is_empty() {
            return;
        }
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = test,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, test));
            }
        }
    }

    fn reorder(&mut self) {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        // sort_by_key is stable: equal lengths keep insertion order
        order.sort_by_key(|&i| std::cmp::Reverse(self.entries[i].0.chars().count()));
        self.longest_first = order;
    }

    /// Exact lookup of an already-uppercased key.
    pub fn get(&self, key: &str) -> Option<CanonicalTest> {
        self.index.get(key).map(|&pos| self.entries[pos].1)
    }

    /// Aliases ordered by descending length.
    pub fn longest_first(&self) -> impl Iterator<Item = (&str, CanonicalTest)> {
        self.longest_first
            .iter()
            .map(|&i| (self.entries[i].0.as_str(), self.entries[i].1))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}
