//! The fixed keyword set of the supported SQL subset.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Keyword {
    SELECT,
    FROM,
    WHERE,
    GROUP,
    BY,
    HAVING,
    ORDER,
    LIMIT,
    AS,
    AND,
    OR,
    NOT,
    IN,
    LIKE,
    IS,
    NULL,
    TRUE,
    FALSE,
    JOIN,
    INNER,
    LEFT,
    ON,
    DISTINCT,
    WITHIN,
    RECORD,
    ASC,
    DESC,
    COUNT,
    SUM,
    AVG,
    MIN,
    MAX,
    GROUP_CONCAT,
    TOP,
    LOWER,
    UPPER,
    LENGTH,
    CONCAT,
    COALESCE,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match word.to_ascii_uppercase().as_str() {
            "SELECT" => SELECT,
            "FROM" => FROM,
            "WHERE" => WHERE,
            "GROUP" => GROUP,
            "BY" => BY,
            "HAVING" => HAVING,
            "ORDER" => ORDER,
            "LIMIT" => LIMIT,
            "AS" => AS,
            "AND" => AND,
            "OR" => OR,
            "NOT" => NOT,
            "IN" => IN,
            "LIKE" => LIKE,
            "IS" => IS,
            "NULL" => NULL,
            "TRUE" => TRUE,
            "FALSE" => FALSE,
            "JOIN" => JOIN,
            "INNER" => INNER,
            "LEFT" => LEFT,
            "ON" => ON,
            "DISTINCT" => DISTINCT,
            "WITHIN" => WITHIN,
            "RECORD" => RECORD,
            "ASC" => ASC,
            "DESC" => DESC,
            "COUNT" => COUNT,
            "SUM" => SUM,
            "AVG" => AVG,
            "MIN" => MIN,
            "MAX" => MAX,
            "GROUP_CONCAT" => GROUP_CONCAT,
            "TOP" => TOP,
            "LOWER" => LOWER,
            "UPPER" => UPPER,
            "LENGTH" => LENGTH,
            "CONCAT" => CONCAT,
            "COALESCE" => COALESCE,
            _ => return None,
        })
    }

    pub fn is_aggregation_fn(self) -> bool {
        matches!(self, Keyword::COUNT | Keyword::SUM | Keyword::AVG | Keyword::MIN | Keyword::MAX | Keyword::GROUP_CONCAT | Keyword::TOP)
    }

    pub fn is_builtin_fn(self) -> bool {
        matches!(self, Keyword::LOWER | Keyword::UPPER | Keyword::LENGTH | Keyword::CONCAT | Keyword::COALESCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        assert_eq!(Keyword::from_word("select"), Some(Keyword::SELECT));
        assert_eq!(Keyword::from_word("Select"), Some(Keyword::SELECT));
    }

    #[test]
    fn unknown_word_is_not_a_keyword() {
        assert_eq!(Keyword::from_word("Make"), None);
    }
}
