use once_cell::sync::Lazy;
use regex::Regex;

// ─── Constants ───────────────────────────────────────────────────

/// Token substituted for every object-id-shaped segment of a key.
pub const ID_PLACEHOLDER: &str = "{id}";

/// 24 hex characters, the shape of a generated object id.
static OBJECT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9a-fA-F]{24}").expect("object id regex"));

// ─── Public entry point ──────────────────────────────────────────

/// Reduces a rendered command (`"get dev:user:<id>:profile"`) to a
/// low-cardinality label value.
///
/// Colons are normalised to spaces, the text is split on single spaces
/// into at most four fields and the third field is taken as the key
/// candidate. Anything shorter than three fields yields an empty label.
/// Every 24-hex run inside the candidate becomes [`ID_PLACEHOLDER`];
/// other variable segments pass through verbatim.
pub fn key_template(command: &str) -> String {
    let normalized = command.replace(':', " ");
    let mut fields = normalized.splitn(4, ' ');

    let key = match (fields.next(), fields.next(), fields.next()) {
        (Some(_), Some(_), Some(key)) => key,
        _ => return String::new(),
    };

    OBJECT_ID.replace_all(key, ID_PLACEHOLDER).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn third_field_is_the_label() {
        assert_eq!(key_template("get dev:user:42"), "user");
        assert_eq!(key_template("hset dev profile name bob"), "profile");
    }

    #[test]
    fn object_ids_are_collapsed() {
        assert_eq!(
            key_template("get mykey:507f1f77bcf86cd799439011:profile"),
            "{id}"
        );
        assert_eq!(
            key_template("get dev user-507f1f77bcf86cd799439011-507F1F77BCF86CD799439012"),
            "user-{id}-{id}"
        );
    }

    #[test]
    fn non_hex_segments_pass_through() {
        assert_eq!(key_template("get dev alice"), "alice");
        // 23 hex chars is not an id
        assert_eq!(
            key_template("get dev 507f1f77bcf86cd79943901"),
            "507f1f77bcf86cd79943901"
        );
    }

    #[test]
    fn short_commands_have_no_label() {
        assert_eq!(key_template(""), "");
        assert_eq!(key_template("ping"), "");
        assert_eq!(key_template("get mykey"), "");
        assert_eq!(key_template("pipeline"), "");
    }

    #[test]
    fn trailing_separator_counts_as_a_field() {
        // "pipeline: " → ["pipeline", "", ""]
        assert_eq!(key_template("pipeline: "), "");
        assert_eq!(key_template("get k:"), "");
    }

    proptest! {
        #[test]
        fn every_id_in_the_key_is_replaced(
            ids in proptest::collection::vec("[0-9a-f]{24}", 0..5),
            tail in "[g-z]{0,8}",
        ) {
            let mut key = String::from("user");
            for id in &ids {
                key.push('-');
                key.push_str(id);
            }
            key.push('-');
            key.push_str(&tail);

            let label = key_template(&format!("get dev:{key}:profile"));

            prop_assert!(!OBJECT_ID.is_match(&label));
            prop_assert_eq!(label.matches(ID_PLACEHOLDER).count(), ids.len());
        }

        #[test]
        fn fewer_than_three_fields_is_empty(s in "[a-z0-9]{0,10}([ :][a-z0-9]{0,10})?") {
            prop_assert_eq!(key_template(&s), "");
        }
    }
}
