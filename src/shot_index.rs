use std::collections::HashSet;

use crate::corner_dataset::SequenceRecord;

/// `(match_id, sequence_id)` pairs whose sequence contains a shot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShotIndex {
    keys: HashSet<(String, String)>,
}

impl ShotIndex {
    pub fn contains(&self, match_id: &str, sequence_id: &str) -> bool {
        // HashSet<(String, String)> has no lookup by borrowed halves.
        self.keys
            .contains(&(match_id.to_string(), sequence_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.keys.iter().map(|(m, s)| (m.as_str(), s.as_str()))
    }
}

/// A row counts as a shot when its base-type name reads `SHOT` or its
/// numeric base-type code equals `shot_type_id`.
pub fn build_shot_index(records: &[SequenceRecord], shot_type_id: i64) -> ShotIndex {
    let keys = records
        .iter()
        .filter(|r| is_shot(r, shot_type_id))
        .map(|r| (r.match_id.clone(), r.sequence_id.clone()))
        .collect();
    ShotIndex { keys }
}

fn is_shot(record: &SequenceRecord, shot_type_id: i64) -> bool {
    if let Some(name) = record.base_type_name.as_deref()
        && name.trim().eq_ignore_ascii_case("SHOT")
    {
        return true;
    }
    record.base_type_id == Some(shot_type_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(m: &str, s: &str, name: Option<&str>, code: Option<i64>) -> SequenceRecord {
        SequenceRecord {
            match_id: m.into(),
            sequence_id: s.into(),
            base_type_name: name.map(str::to_string),
            base_type_id: code,
            team_raw: None,
            player: None,
        }
    }

    #[test]
    fn name_or_code_marks_a_shot() {
        let idx = build_shot_index(
            &[
                rec("1", "10", Some("shot"), None),
                rec("1", "11", None, Some(6)),
                rec("1", "12", Some("PASS"), Some(1)),
                rec("2", "10", Some("SHOT"), Some(6)),
                rec("2", "10", Some("SHOT"), Some(6)),
            ],
            6,
        );
        assert_eq!(idx.len(), 3);
        assert!(idx.contains("1", "10"));
        assert!(idx.contains("1", "11"));
        assert!(!idx.contains("1", "12"));
    }

    #[test]
    fn no_type_information_means_no_shots() {
        let idx = build_shot_index(&[rec("1", "10", None, None)], 6);
        assert!(idx.is_empty());
    }

    #[test]
    fn row_order_does_not_matter() {
        let rows = vec![
            rec("1", "10", Some("Shot"), None),
            rec("1", "11", Some("PASS"), Some(2)),
            rec("2", "20", None, Some(6)),
            rec("2", "21", Some("CLEARANCE"), Some(4)),
            rec("2", "20", Some("PASS"), Some(2)),
            rec("3", "30", Some(" shot "), Some(6)),
        ];
        let forward = build_shot_index(&rows, 6);

        let mut reversed = rows.clone();
        reversed.reverse();
        assert_eq!(build_shot_index(&reversed, 6), forward);

        let mut rotated = rows.clone();
        rotated.rotate_left(2);
        assert_eq!(build_shot_index(&rotated, 6), forward);
        assert_eq!(forward.len(), 3);
    }
}
