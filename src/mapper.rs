use serde_json::Value;

use crate::record::CanonicalRecord;

/// Fields copied straight off the bulk listing payload. The listing already
/// uses our canonical names, so both columns match.
pub const LISTING_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("county", "county"),
    ("postcode", "postcode"),
    ("latitude", "latitude"),
    ("longitude", "longitude"),
    ("address", "address"),
    ("full_address", "full_address"),
    ("town", "town"),
    ("phone", "phone"),
];

/// Vendor field names on the per-club detail endpoint mapped to canonical
/// column names.
pub const DETAIL_FIELDS: &[(&str, &str)] = &[
    ("Website", "website"),
    ("Email", "email"),
    ("LogoImage", "image"),
    ("FacilityDescription", "description"),
    ("AmenitiesDescription", "amenities"),
    ("NoOfHoles", "holes"),
    ("FoundingYear", "founding_year"),
    ("HeadProName", "head_pro_name"),
    ("HeadProEmail", "head_pro_email"),
    ("ProShopPhone", "pro_shop_phone"),
    ("ManagerName", "manager_name"),
    ("TotalMembers", "total_members"),
    ("TotalMen", "total_men"),
    ("TotalWomen", "total_women"),
    ("AdultMen", "adult_men"),
    ("AdultWomen", "adult_women"),
    ("JuniorMen", "junior_men"),
    ("JuniorWomen", "junior_women"),
    ("TeeBookingUrl", "tee_booking_url"),
    ("MembershipUrl", "membership_url"),
    ("FacebookUrl", "facebook_url"),
    ("TwitterUrl", "twitter_url"),
    ("InstagramUrl", "instagram_url"),
    ("FacilityTypes", "facility_types"),
];

/// Copy mapped fields from a raw source object into a canonical record.
/// Absent, null and empty-string values are omitted entirely rather than
/// written as placeholders, so a later merge can never blank out a field
/// that an earlier pass filled in. List values become comma-joined strings.
pub fn map_record(source: &Value, mapping: &[(&str, &str)]) -> CanonicalRecord {
    let mut record = CanonicalRecord::new();
    let Some(object) = source.as_object() else {
        return record;
    };
    for (source_key, dest_key) in mapping {
        let Some(value) = object.get(*source_key) else {
            continue;
        };
        match value {
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                record.insert(dest_key, Value::String(joined));
            }
            other => record.insert(dest_key, other.clone()),
        }
    }
    record
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_and_empty_values_are_omitted() {
        let source = json!({
            "Website": "https://example.golf",
            "Email": "",
            "FacilityDescription": null,
            "NoOfHoles": 18,
        });
        let record = map_record(&source, DETAIL_FIELDS);

        assert_eq!(record.get_str("website"), Some("https://example.golf"));
        assert!(!record.contains("email"));
        assert!(!record.contains("description"));
        // Unmapped-but-absent keys never show up either.
        assert!(!record.contains("manager_name"));
        assert_eq!(record.get("holes"), Some(&json!(18)));
    }

    #[test]
    fn lists_become_comma_joined_strings() {
        let source = json!({ "FacilityTypes": [1, 5, 12] });
        let record = map_record(&source, DETAIL_FIELDS);
        assert_eq!(record.get_str("facility_types"), Some("1,5,12"));
    }

    #[test]
    fn listing_fields_pass_through() {
        let source = json!({
            "id": 102383,
            "name": "Alnmouth Golf Club",
            "postcode": "NE66 3BE",
            "latitude": 55.38,
            "longitude": -1.61,
            "phone": "",
        });
        let record = map_record(&source, LISTING_FIELDS);
        assert_eq!(record.id(), Some(102383));
        assert_eq!(record.get_str("postcode"), Some("NE66 3BE"));
        assert!(!record.contains("phone"));
        assert!(!record.contains("county"));
    }

    #[test]
    fn non_object_source_maps_to_empty_record() {
        assert!(map_record(&json!([1, 2, 3]), LISTING_FIELDS).is_empty());
        assert!(map_record(&json!("nope"), LISTING_FIELDS).is_empty());
    }
}
