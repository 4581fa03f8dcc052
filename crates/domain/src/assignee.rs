//! 担当者の名前解決
//!
//! 自由入力の名前（`@` メンションの途中文字列や、抽出サービスが返した名前）を
//! 名簿のメンバー一人に対応付ける。照合は次の順に行い、最初に一致した段で止まる。
//!
//! 1. 表示名との完全一致
//! 2. 表示名の最初のトークンとの一致
//! 3. 部分一致（表示名が問い合わせを含む、または問い合わせが最初のトークンを含む）
//! 4. メールアドレスの `@` より前との一致
//!
//! いずれも大文字小文字を区別しない。同じ段で複数が一致した場合は名簿の並びで先のメンバー。

use crate::profile::MemberProfile;

/// 照合の段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    Exact,
    FirstToken,
    Containment,
    EmailLocalPart,
}

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

/// メンバーが満たす最も優先度の高い段を返す
///
/// `query` は正規化済み（前後空白除去・小文字化）であること。
fn best_tier(query: &str, member: &MemberProfile) -> Option<MatchTier> {
    let display = member.display_name.to_lowercase();
    let first_token = member.first_token().to_lowercase();

    if display == query {
        return Some(MatchTier::Exact);
    }
    if !first_token.is_empty() && first_token == query {
        return Some(MatchTier::FirstToken);
    }
    if display.contains(query) || (!first_token.is_empty() && query.contains(&first_token)) {
        return Some(MatchTier::Containment);
    }
    let local_part = member.email_local_part().to_lowercase();
    if !local_part.is_empty() && local_part == query {
        return Some(MatchTier::EmailLocalPart);
    }
    None
}

/// 問い合わせ文字列に対応するメンバーを一人選ぶ
///
/// 空文字列（空白のみを含む）は走査せずに `None`。
pub fn resolve<'a>(query: &str, roster: &'a [MemberProfile]) -> Option<&'a MemberProfile> {
    resolve_with_tier(query, roster).map(|(member, _)| member)
}

/// [`resolve`] と同じ照合を行い、一致した段も返す
pub fn resolve_with_tier<'a>(
    query: &str,
    roster: &'a [MemberProfile],
) -> Option<(&'a MemberProfile, MatchTier)> {
    let query = normalize(query);
    if query.is_empty() {
        return None;
    }

    // min_by_key は同値のとき最初の要素を返すので、名簿順のタイブレークになる
    roster
        .iter()
        .filter_map(|member| best_tier(&query, member).map(|tier| (member, tier)))
        .min_by_key(|(_, tier)| *tier)
}

/// 一致する全メンバーを段の優先順（同じ段の中は名簿順）で返す
///
/// メンション入力の候補表示用。選択はユーザーに任せる。
pub fn matching_members<'a>(query: &str, roster: &'a [MemberProfile]) -> Vec<&'a MemberProfile> {
    let query = normalize(query);
    if query.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<(MatchTier, usize, &MemberProfile)> = roster
        .iter()
        .enumerate()
        .filter_map(|(index, member)| best_tier(&query, member).map(|tier| (tier, index, member)))
        .collect();
    matches.sort_by_key(|(tier, index, _)| (*tier, *index));
    matches.into_iter().map(|(_, _, member)| member).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::UserId;

    fn member(id: &str, name: &str, email: &str) -> MemberProfile {
        MemberProfile::new(UserId::from_string(id.to_string()).unwrap(), name, email).unwrap()
    }

    fn roster() -> Vec<MemberProfile> {
        vec![
            member("u1", "Kim Cheolsu", "cs@x.com"),
            member("u2", "Cheolsu Park", "park@x.com"),
        ]
    }

    #[test]
    fn test_first_token_beats_containment() {
        let roster = roster();
        let (found, tier) = resolve_with_tier("Cheolsu", &roster).unwrap();
        assert_eq!(found.display_name, "Cheolsu Park");
        assert_eq!(tier, MatchTier::FirstToken);
    }

    #[test]
    fn test_email_local_part_match() {
        let roster = roster();
        let (found, tier) = resolve_with_tier("cs", &roster).unwrap();
        assert_eq!(found.display_name, "Kim Cheolsu");
        assert_eq!(tier, MatchTier::EmailLocalPart);
    }

    #[test]
    fn test_empty_and_unknown_queries() {
        let roster = roster();
        assert!(resolve("", &roster).is_none());
        assert!(resolve("   ", &roster).is_none());
        assert!(resolve("nobody", &roster).is_none());
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let roster = roster();
        let (found, tier) = resolve_with_tier("  kim CHEOLSU ", &roster).unwrap();
        assert_eq!(found.user_id.as_str(), "u1");
        assert_eq!(tier, MatchTier::Exact);
    }

    #[test]
    fn test_containment_in_either_direction() {
        let roster = roster();
        // 表示名が問い合わせを含む
        assert_eq!(resolve("park", &roster).unwrap().user_id.as_str(), "u2");
        // 問い合わせが最初のトークンを含む
        assert_eq!(resolve("Kim-sshi", &roster).unwrap().user_id.as_str(), "u1");
    }

    #[test]
    fn test_ties_resolve_to_roster_order() {
        let roster = vec![
            member("u1", "Alex Kim", "alex.k@x.com"),
            member("u2", "Alex Lee", "alex.l@x.com"),
        ];
        assert_eq!(resolve("alex", &roster).unwrap().user_id.as_str(), "u1");

        let reversed: Vec<MemberProfile> = roster.into_iter().rev().collect();
        assert_eq!(resolve("alex", &reversed).unwrap().user_id.as_str(), "u2");
    }

    #[test]
    fn test_matching_members_lists_all_tiers() {
        let roster = roster();
        let names: Vec<&str> = matching_members("cheolsu", &roster)
            .iter()
            .map(|m| m.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Cheolsu Park", "Kim Cheolsu"]);

        assert!(matching_members("", &roster).is_empty());
        assert!(matching_members("zzz", &roster).is_empty());
    }
}
