//! Persona used to shape generation requests and spoken replies
//!
//! The persona is fixed for the whole run: the preamble is loaded once at
//! startup and every prompt is built from the same bytes.

use crate::sanitize;

/// Built-in persona name
pub const DEFAULT_NAME: &str = "ずんだもん";

/// Built-in preamble: character sheet, closing-particle rule and one worked turn
pub const DEFAULT_PREAMBLE: &str = "
あなたは日本語で配信しているずんだもんです。あなたはこれから視聴者からの質問に答えます。この後に質問が続きます。語尾に必ず「～なのだ」をつけて答えてください。

以下はずんだもんの設定です。

東北ずん子の武器である「ずんだアロー」に変身する妖精またはマスコット
一人称はボク

以下はずんだもんのセリフです。

視聴者「あなたは誰？」
ずんだもん「ボクはずんだもんなのだ！」


ずんだもんっぽく、なるべく長文で以下に返信してください。
";

/// Opening quote of a quoted turn
pub const OPEN_QUOTE: &str = "「";

/// Closing quote of a quoted turn
pub const CLOSE_QUOTE: &str = "」";

/// Speaking persona of the co-host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// Speaker tag the generation backend may echo back (e.g. `ずんだもん`)
    pub name: String,

    /// Label used for the viewer's turn in the prompt
    pub viewer_label: String,

    /// Static instruction text prepended to every prompt
    pub preamble: String,

    /// Spoken before the viewer's comment on the echo leg
    pub question_prefix: String,

    /// Spoken when generation yields no usable text
    pub fallback_answer: String,

    /// Written to the transcript when a stream error carries no message
    pub stream_error_fallback: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self::zundamon()
    }
}

impl Persona {
    /// The built-in ずんだもん persona
    #[must_use]
    pub fn zundamon() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            viewer_label: "視聴者".to_string(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            question_prefix: "質問、".to_string(),
            fallback_answer: "エラーが起きたのだ。".to_string(),
            stream_error_fallback: "エラーハンドリングをしているのだ。".to_string(),
        }
    }

    /// Build the completion prompt for a viewer comment
    ///
    /// The comment is quoted as the viewer's turn right after the preamble, so
    /// the backend continues the dialogue in character.
    #[must_use]
    pub fn build_prompt(&self, comment_text: &str) -> String {
        let mut prompt = String::with_capacity(
            self.preamble.len() + self.viewer_label.len() + comment_text.len() + 8,
        );
        prompt.push_str(&self.preamble);
        prompt.push_str(&self.viewer_label);
        prompt.push_str(OPEN_QUOTE);
        prompt.push_str(comment_text);
        prompt.push_str(CLOSE_QUOTE);
        prompt
    }

    /// Text spoken on the echo leg before the answer is ready
    #[must_use]
    pub fn echo_text(&self, comment_text: &str) -> String {
        format!("{}{comment_text}", self.question_prefix)
    }

    /// Strip the echoed speaker wrapper from generated text
    #[must_use]
    pub fn sanitize(&self, raw_text: &str) -> String {
        sanitize::sanitize(raw_text, &self.name, &self.fallback_answer)
    }
}
