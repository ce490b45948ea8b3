//! Form/costume key normalization.
//!
//! Player data and the reference dataset disagree on how variant forms are
//! spelled (`PIKACHU_KARIYUSHI`, `Kariyushi`, `pikachu-kariyushi`, ...).
//! Both sides are reduced to the same join key here: uppercase, species
//! name removed, separators stripped, empty/`UNSET` canonicalized to
//! `NORMAL`. Pure functions so every tricky case can be pinned in a test.

static UNSET_SENTINEL: &str = "UNSET";
pub static NORMAL_FORM: &str = "NORMAL";

/// Replaces the handful of accented characters that occur in species
/// names (Flabébé and friends) with their ASCII base letter.
pub fn fold_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

fn strip_separators(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .collect()
}

/// Derives the canonical form key from a raw form identifier. The species'
/// localized name is removed first when it is embedded in the identifier.
pub fn normalize_form_key(raw_form: &str, species_name: &str) -> String {
    let mut key = fold_diacritics(raw_form).to_uppercase();
    let species = fold_diacritics(species_name).to_uppercase();
    if !species.is_empty() && key.contains(&species) {
        key = key.replace(&species, "");
    }
    let key = strip_separators(&key);
    if key.is_empty() || key == UNSET_SENTINEL {
        NORMAL_FORM.to_string()
    } else {
        key
    }
}

/// Normalizes a sprite asset's form or costume label. No species removal
/// and no `NORMAL` canonicalization: an absent label stays absent.
pub fn normalize_asset_key(raw: &str) -> String {
    strip_separators(&fold_diacritics(raw).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_species_form_maps_to_normal() {
        assert_eq!(normalize_form_key("PIKACHU_NORMAL", "Pikachu"), "NORMAL");
        assert_eq!(normalize_form_key("Pikachu", "Pikachu"), "NORMAL");
    }

    #[test]
    fn regional_form_survives_species_removal() {
        assert_eq!(normalize_form_key("VULPIX_ALOLA", "Vulpix"), "ALOLA");
        assert_eq!(normalize_form_key("MR_RIME_GALARIAN", "Mr. Rime"), "MRRIMEGALARIAN");
    }

    #[test]
    fn unset_and_empty_become_normal() {
        assert_eq!(normalize_form_key("UNSET", "Bulbasaur"), "NORMAL");
        assert_eq!(normalize_form_key("", "Bulbasaur"), "NORMAL");
        assert_eq!(normalize_form_key("  _- ", "Bulbasaur"), "NORMAL");
    }

    #[test]
    fn separators_and_case_are_stripped() {
        assert_eq!(
            normalize_form_key("pikachu-kariyushi", "Pikachu"),
            "KARIYUSHI"
        );
        assert_eq!(normalize_form_key("COSTUME 2020", "Pikachu"), "COSTUME2020");
    }

    #[test]
    fn diacritics_fold_before_species_removal() {
        assert_eq!(normalize_form_key("FLABEBE_RED", "Flabébé"), "RED");
        assert_eq!(fold_diacritics("Flabébé"), "Flabebe");
    }

    #[test]
    fn asset_keys_keep_no_normal_canonicalization() {
        assert_eq!(normalize_asset_key("holiday_2020"), "HOLIDAY2020");
        assert_eq!(normalize_asset_key(""), "");
    }
}
