use crate::assignee::matching_members;
use crate::errors::{DomainError, DomainResult};
use crate::identifiers::{ColumnId, UserId};
use crate::profile::MemberProfile;
use crate::todo::NewTodo;

/// カーソル位置で入力中のメンション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionFragment {
    /// `@` のバイト位置
    pub start: usize,
    /// カーソル位置（バイト）
    pub end: usize,
    /// `@` の後ろからカーソルまでの文字列
    pub query: String,
}

/// カーソルより前で最後のエスケープされていない `@` から、入力中のメンションを取り出す
///
/// `@` からカーソルまでに空白が含まれる場合はメンション入力中とみなさない。
pub fn active_mention(text: &str, cursor: usize) -> Option<MentionFragment> {
    let before = text.get(..cursor)?;

    let start = before
        .char_indices()
        .rev()
        .find(|(index, c)| *c == '@' && !before[..*index].ends_with('\\'))
        .map(|(index, _)| index)?;

    let query = &before[start + 1..];
    if query.chars().any(char::is_whitespace) {
        return None;
    }

    Some(MentionFragment {
        start,
        end: cursor,
        query: query.to_string(),
    })
}

/// 候補一覧
///
/// `@` を打った直後（空の問い合わせ）は名簿全体を出す。
pub fn suggestions<'a>(fragment: &MentionFragment, roster: &'a [MemberProfile]) -> Vec<&'a MemberProfile> {
    if fragment.query.trim().is_empty() {
        return roster.iter().collect();
    }
    matching_members(&fragment.query, roster)
}

/// メンション付きのカードタイトル入力
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MentionDraft {
    pub text: String,
    pub assignee: Option<UserId>,
}

impl MentionDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            assignee: None,
        }
    }

    /// 入力中のメンションを選択したメンバーの `@表示名` に置き換える
    ///
    /// 置換後のカーソル位置を返す。`fragment` が別の（古い）テキストから
    /// 取り出されたもので、今のテキスト上の `@` を指していなければ何も変えずにエラー。
    pub fn select(
        &mut self,
        fragment: &MentionFragment,
        member: &MemberProfile,
    ) -> DomainResult<usize> {
        let (start, end) = (fragment.start, fragment.end);
        let in_text = start <= end
            && end <= self.text.len()
            && self.text.is_char_boundary(start)
            && self.text.is_char_boundary(end)
            && self.text[start..].starts_with('@');
        if !in_text {
            return Err(DomainError::Validation(
                "Mention no longer matches the text".to_string(),
            ));
        }

        let mention = format!("@{}", member.display_name);
        self.text.replace_range(start..end, &mention);
        self.assignee = Some(member.user_id.clone());
        Ok(start + mention.len())
    }

    /// 確定してカード作成の入力に変換
    pub fn submit(&self, status: Option<ColumnId>) -> DomainResult<NewTodo> {
        let title = self.text.trim();
        if title.is_empty() {
            return Err(DomainError::Validation(
                "Todo title cannot be empty".to_string(),
            ));
        }
        Ok(NewTodo {
            title: title.to_string(),
            status,
            assignee: self.assignee.clone(),
        })
    }
}
