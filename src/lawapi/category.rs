use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Field names used by one category's records, most specific first.
pub(crate) struct FieldMap {
    pub id: &'static [&'static str],
    pub title: &'static [&'static str],
    pub date: &'static [&'static str],
    pub summary: &'static [&'static str],
    pub link: &'static [&'static str],
}

/// Document categories served by the law.go.kr Open API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Current statutes, enforcement decrees and rules (법령)
    Statute,
    /// Supreme Court and lower court precedents (판례)
    Precedent,
    /// Constitutional Court decisions (헌재결정례)
    Constitutional,
    /// Statutory interpretations by the Ministry of Government Legislation (법령해석례)
    Interpretation,
    /// Administrative appeal rulings (행정심판례)
    AdminAppeal,
    /// Administrative rules: directives, established rules, notices (행정규칙)
    AdminRule,
    /// Local ordinances and rules (자치법규)
    LocalOrdinance,
    /// Treaties (조약)
    Treaty,
    /// Legal terms dictionary (법령용어)
    LegalTerm,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Statute,
        Category::Precedent,
        Category::Constitutional,
        Category::Interpretation,
        Category::AdminAppeal,
        Category::AdminRule,
        Category::LocalOrdinance,
        Category::Treaty,
        Category::LegalTerm,
    ];

    /// The API `target` parameter.
    pub fn target(self) -> &'static str {
        match self {
            Category::Statute => "law",
            Category::Precedent => "prec",
            Category::Constitutional => "detc",
            Category::Interpretation => "expc",
            Category::AdminAppeal => "decc",
            Category::AdminRule => "admrul",
            Category::LocalOrdinance => "ordin",
            Category::Treaty => "trty",
            Category::LegalTerm => "lstrm",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Statute => "Statutes",
            Category::Precedent => "Precedents",
            Category::Constitutional => "Constitutional Court decisions",
            Category::Interpretation => "Statutory interpretations",
            Category::AdminAppeal => "Administrative appeal rulings",
            Category::AdminRule => "Administrative rules",
            Category::LocalOrdinance => "Local ordinances",
            Category::Treaty => "Treaties",
            Category::LegalTerm => "Legal terms",
        }
    }

    /// Query parameter naming a document on the detail endpoint.
    /// Statutes are addressed by serial number (`MST`), everything else by `ID`.
    pub fn detail_id_param(self) -> &'static str {
        match self {
            Category::Statute => "MST",
            _ => "ID",
        }
    }

    pub(crate) fn fields(self) -> &'static FieldMap {
        match self {
            Category::Statute => &FieldMap {
                id: &["법령일련번호", "법령ID"],
                title: &["법령명한글", "법령명"],
                date: &["시행일자", "공포일자"],
                summary: &["조문내용"],
                link: &["법령상세링크"],
            },
            Category::Precedent => &FieldMap {
                id: &["판례일련번호"],
                title: &["사건명"],
                date: &["선고일자"],
                summary: &["판시사항", "판결요지"],
                link: &["판례상세링크"],
            },
            Category::Constitutional => &FieldMap {
                id: &["헌재결정례일련번호"],
                title: &["사건명"],
                date: &["종국일자"],
                summary: &["결정요지", "판시사항"],
                link: &["헌재결정례상세링크"],
            },
            Category::Interpretation => &FieldMap {
                id: &["법령해석례일련번호"],
                title: &["안건명"],
                date: &["회신일자", "해석일자"],
                summary: &["회답", "질의요지"],
                link: &["법령해석례상세링크"],
            },
            Category::AdminAppeal => &FieldMap {
                id: &["행정심판재결례일련번호", "행정심판례일련번호"],
                title: &["사건명"],
                date: &["의결일자", "처분일자"],
                summary: &["재결요지"],
                link: &["행정심판례상세링크"],
            },
            Category::AdminRule => &FieldMap {
                id: &["행정규칙일련번호", "행정규칙ID"],
                title: &["행정규칙명"],
                date: &["발령일자", "시행일자"],
                summary: &[],
                link: &["행정규칙상세링크"],
            },
            Category::LocalOrdinance => &FieldMap {
                id: &["자치법규일련번호", "자치법규ID"],
                title: &["자치법규명"],
                date: &["공포일자", "시행일자"],
                summary: &[],
                link: &["자치법규상세링크"],
            },
            Category::Treaty => &FieldMap {
                id: &["조약일련번호"],
                title: &["조약명", "조약한글명"],
                date: &["발효일자", "서명일자"],
                summary: &[],
                link: &["조약상세링크"],
            },
            Category::LegalTerm => &FieldMap {
                id: &["법령용어ID", "법령용어일련번호"],
                title: &["법령용어명"],
                date: &[],
                summary: &["법령용어정의"],
                link: &["법령용어상세링크"],
            },
        }
    }
}

/// Result ordering understood by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    NameAsc,
    NameDesc,
    DateAsc,
    DateDesc,
    NumberAsc,
    NumberDesc,
}

impl SortOrder {
    pub fn code(self) -> &'static str {
        match self {
            SortOrder::NameAsc => "lasc",
            SortOrder::NameDesc => "ldes",
            SortOrder::DateAsc => "dasc",
            SortOrder::DateDesc => "ddes",
            SortOrder::NumberAsc => "nasc",
            SortOrder::NumberDesc => "ndes",
        }
    }
}

/// Court level filter for precedent searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Court {
    /// 대법원
    Supreme,
    /// 하급심
    Lower,
}

impl Court {
    pub fn code(self) -> &'static str {
        match self {
            Court::Supreme => "400201",
            Court::Lower => "400202",
        }
    }
}
