use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde uses the same string form, so stored rows, JSON and plans agree.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use str_enum;

str_enum!(
    /// Panel a canonical test belongs to.
    ReportCategory {
        Cbc => "CBC",
        Liver => "LIVER",
        Kidney => "KIDNEY",
        Thyroid => "THYROID",
        Lipid => "LIPID",
        Diabetes => "DIABETES",
        Other => "OTHER",
    }
);

str_enum!(AbnormalDirection {
    Low => "LOW",
    High => "HIGH",
});

str_enum!(Gender {
    Male => "M",
    Female => "F",
});

str_enum!(
    /// Comparison applied to `value_standard` by FILTER and AGGREGATION queries.
    ComparisonOp {
        Eq => "eq",
        Gt => "gt",
        Lt => "lt",
        Gte => "gte",
        Lte => "lte",
        Between => "between",
    }
);

str_enum!(AggregationKind {
    Count => "count",
    Avg => "avg",
    Min => "min",
    Max => "max",
    Sum => "sum",
});

str_enum!(
    /// Comparator found in front of a numeric result ("<0.5", "> 90").
    ValueQualifier {
        LessThan => "<",
        GreaterThan => ">",
    }
);

impl Gender {
    /// Lenient parse of free-text gender: M/MALE and F/FEMALE, any case.
    pub fn from_text(text: &str) -> Option<Gender> {
        match text.trim().to_uppercase().as_str() {
            "M" | "MALE" => Some(Gender::Male),
            "F" | "FEMALE" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl ComparisonOp {
    /// Lower-bound style operators consume a reference minimum.
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Self::Lt | Self::Lte)
    }

    pub fn is_upper_bound(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte)
    }
}

impl AbnormalDirection {
    /// Operator that selects values in this direction.
    pub fn operator(&self) -> ComparisonOp {
        match self {
            Self::Low => ComparisonOp::Lt,
            Self::High => ComparisonOp::Gt,
        }
    }
}
