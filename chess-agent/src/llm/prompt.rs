//! LLM 提示模板
//!
//! 模板使用 `{name}` 占位符，`{{` / `}}` 转义为字面大括号。
//! 可用占位符见 [`PLACEHOLDERS`]，其值全部由当前对局状态推导，与服务商无关。

use once_cell::sync::Lazy;
use protocol::{GameState, Side, BOARD_SIZE, RECENT_MOVES_WINDOW};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::parser::MoveParser;

/// 模板可用的占位符
pub const PLACEHOLDERS: [&str; 6] = [
    "role",
    "board",
    "piece_positions",
    "valid_moves",
    "full_observation",
    "past_up_to_five_moves",
];

/// 未知占位符的处理方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderPolicy {
    /// 原样保留 `{name}` 并记录警告
    #[default]
    Literal,
    /// 渲染失败
    Reject,
}

/// 渲染错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Unknown template placeholder: {{{name}}}")]
    UnknownPlaceholder { name: String },
}

/// 一次渲染所需的全部变量
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptContext {
    pub role: String,
    pub board: String,
    pub piece_positions: String,
    pub valid_moves: String,
    pub full_observation: String,
    pub past_up_to_five_moves: String,
}

impl PromptContext {
    /// 从对局状态推导
    pub fn from_state(state: &GameState) -> Self {
        let board = board_with_coords(state);
        let valid_moves = format_valid_moves(&state.legal_moves());
        let last_move = state
            .last_move()
            .map(MoveParser::bracket)
            .unwrap_or_else(|| "none".to_string());
        let full_observation = format!(
            "{}\nLast move: {}\nValid moves: {}",
            board, last_move, valid_moves
        );

        Self {
            role: state.side_to_move().name().to_string(),
            piece_positions: piece_positions(state),
            past_up_to_five_moves: recent_moves(state, RECENT_MOVES_WINDOW),
            board,
            valid_moves,
            full_observation,
        }
    }

    /// 按名称取值
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "role" => Some(&self.role),
            "board" => Some(&self.board),
            "piece_positions" => Some(&self.piece_positions),
            "valid_moves" => Some(&self.valid_moves),
            "full_observation" => Some(&self.full_observation),
            "past_up_to_five_moves" => Some(&self.past_up_to_five_moves),
            _ => None,
        }
    }
}

/// 转义括号或 `{name}` 占位符
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
});

/// 提示渲染器
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptRenderer {
    policy: PlaceholderPolicy,
}

impl PromptRenderer {
    pub fn new(policy: PlaceholderPolicy) -> Self {
        Self { policy }
    }

    /// 渲染模板；同一模板与同一局面总是得到相同文本
    pub fn render(&self, template: &str, context: &PromptContext) -> Result<String, RenderError> {
        let mut out = String::with_capacity(template.len() + context.board.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), name) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);
            last = whole.end();

            match name {
                Some(name) => match context.get(name.as_str()) {
                    Some(value) => out.push_str(value),
                    None => {
                        self.unknown(name.as_str())?;
                        out.push_str(whole.as_str());
                    }
                },
                // `{{` / `}}` 只保留一个括号
                None => out.push_str(&whole.as_str()[..1]),
            }
        }
        out.push_str(&template[last..]);

        Ok(out)
    }

    /// 启动时检查模板，`Reject` 策略下未知占位符立即报错
    pub fn validate(&self, template: &str) -> Result<(), RenderError> {
        for name in PLACEHOLDER.captures_iter(template).filter_map(|caps| caps.get(1)) {
            if !PLACEHOLDERS.contains(&name.as_str()) {
                self.unknown(name.as_str())?;
            }
        }
        Ok(())
    }

    fn unknown(&self, name: &str) -> Result<(), RenderError> {
        match self.policy {
            PlaceholderPolicy::Literal => {
                warn!("Template placeholder {{{}}} is not defined, left as literal", name);
                Ok(())
            }
            PlaceholderPolicy::Reject => Err(RenderError::UnknownPlaceholder {
                name: name.to_string(),
            }),
        }
    }

    /// 重试时追加在步骤提示之后的纠正说明
    pub fn corrective_notice(attempt: u32, role: &str, reason: &str, valid_moves: &str) -> String {
        format!(
            "\n\nAttempt {} failed: {}. Remember that you are playing as {} in this chess game \
             and you must choose a move from the valid moves list: {}. \
             Return the move in the format [UCI_MOVE], for example [e2e4].",
            attempt, reason, role, valid_moves
        )
    }
}

/// 带坐标的 ASCII 棋盘，白方大写、黑方小写、空格为 `.`
pub fn board_with_coords(state: &GameState) -> String {
    let inner_width = BOARD_SIZE as usize * 2 - 1;
    let border = format!("   +{}+", "-".repeat(inner_width + 2));

    let mut lines = Vec::with_capacity(BOARD_SIZE as usize + 3);
    lines.push(border.clone());
    for rank in (0..BOARD_SIZE).rev() {
        let row: Vec<String> = (0..BOARD_SIZE)
            .map(|file| match state.piece_at(file, rank) {
                Some(piece) => piece.symbol().to_string(),
                None => ".".to_string(),
            })
            .collect();
        lines.push(format!(" {} | {} |", rank + 1, row.join(" ")));
    }
    lines.push(border);
    lines.push(format!("    {} ", "a b c d e f g h"));

    lines.join("\n")
}

/// 双方棋子位置，按王后车象马兵排序，同类按 a1..h8 顺序
pub fn piece_positions(state: &GameState) -> String {
    let mut white = Vec::new();
    let mut black = Vec::new();

    for rank in 0..BOARD_SIZE {
        for file in 0..BOARD_SIZE {
            if let Some(piece) = state.piece_at(file, rank) {
                let entry = (piece.kind, format!("{}-{}", piece.symbol(), square_name(file, rank)));
                match piece.side {
                    Side::White => white.push(entry),
                    Side::Black => black.push(entry),
                }
            }
        }
    }

    let line = |label: &str, mut pieces: Vec<(protocol::PieceKind, String)>| {
        // 稳定排序保持格子顺序
        pieces.sort_by_key(|(kind, _)| *kind);
        if pieces.is_empty() {
            format!("{} pieces: none", label)
        } else {
            let names: Vec<String> = pieces.into_iter().map(|(_, name)| name).collect();
            format!("{} pieces: {}", label, names.join(", "))
        }
    };

    format!("{}\n{}", line("White", white), line("Black", black))
}

/// 合法走法列表，如 `[e2e4], [d2d4]`
pub fn format_valid_moves(moves: &[String]) -> String {
    if moves.is_empty() {
        return "none".to_string();
    }
    moves
        .iter()
        .map(|m| MoveParser::bracket(m))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 最近若干步走法，每行 `White: [e2e4]`；尚无走法时为 `[]`
pub fn recent_moves(state: &GameState, window: usize) -> String {
    let history = state.history();
    if history.is_empty() {
        return "[]".to_string();
    }

    let total = history.len();
    let current = state.side_to_move();
    let start = total.saturating_sub(window);

    history[start..]
        .iter()
        .enumerate()
        .map(|(offset, mv)| {
            let index = start + offset;
            // 与当前走子方相隔偶数步的是同一方
            let side = if (total - index) % 2 == 0 { current } else { current.opponent() };
            format!("{}: {}", side.name(), MoveParser::bracket(mv))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn square_name(file: u8, rank: u8) -> String {
    format!("{}{}", (b'a' + file) as char, rank + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Fen;

    fn played(moves: &[&str]) -> GameState {
        let mut state = GameState::initial();
        for mv in moves {
            state.apply(mv).unwrap();
        }
        state
    }

    #[test]
    fn test_board_with_coords_initial() {
        let board = board_with_coords(&GameState::initial());
        let expected = [
            "   +-----------------+",
            " 8 | r n b q k b n r |",
            " 7 | p p p p p p p p |",
            " 6 | . . . . . . . . |",
            " 5 | . . . . . . . . |",
            " 4 | . . . . . . . . |",
            " 3 | . . . . . . . . |",
            " 2 | P P P P P P P P |",
            " 1 | R N B Q K B N R |",
            "   +-----------------+",
            "    a b c d e f g h ",
        ]
        .join("\n");
        assert_eq!(board, expected);
    }

    #[test]
    fn test_piece_positions_order() {
        let state = Fen::parse("4k3/8/8/8/8/8/P6P/R3K2R w KQ - 0 1").unwrap();
        assert_eq!(
            piece_positions(&state),
            "White pieces: K-e1, R-a1, R-h1, P-a2, P-h2\nBlack pieces: k-e8"
        );
    }

    #[test]
    fn test_piece_positions_initial_starts_with_kings() {
        let text = piece_positions(&GameState::initial());
        assert!(text.starts_with("White pieces: K-e1, Q-d1, R-a1, R-h1, B-c1, B-f1, N-b1, N-g1, P-a2"));
        assert!(text.contains("\nBlack pieces: k-e8, q-d8, r-a8, r-h8"));
    }

    #[test]
    fn test_recent_moves() {
        assert_eq!(recent_moves(&GameState::initial(), 5), "[]");

        let state = played(&["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6"]);
        assert_eq!(
            recent_moves(&state, 5),
            "Black: [e7e5]\nWhite: [g1f3]\nBlack: [b8c6]\nWhite: [f1b5]\nBlack: [a7a6]"
        );
    }

    #[test]
    fn test_recent_moves_from_black_start() {
        let mut state =
            Fen::parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
        state.apply("e7e5").unwrap();
        assert_eq!(recent_moves(&state, 5), "Black: [e7e5]");
    }

    #[test]
    fn test_render_all_placeholders() {
        let state = played(&["e2e4"]);
        let context = PromptContext::from_state(&state);
        let template = "You are {role}.\n{board}\n{piece_positions}\nMoves: {valid_moves}\nHistory:\n{past_up_to_five_moves}";
        let rendered = PromptRenderer::default().render(template, &context).unwrap();

        assert!(rendered.starts_with("You are Black.\n"));
        assert!(rendered.contains(" 4 | . . . . P . . . |"));
        assert!(rendered.contains("[e7e5]"));
        assert!(rendered.contains("History:\nWhite: [e2e4]"));
        assert!(!rendered.contains('{'));
    }

    #[test]
    fn test_full_observation() {
        let context = PromptContext::from_state(&played(&["d2d4"]));
        assert!(context.full_observation.contains("Last move: [d2d4]"));
        assert!(context.full_observation.contains("Valid moves: ["));

        let context = PromptContext::from_state(&GameState::initial());
        assert!(context.full_observation.contains("Last move: none"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let state = played(&["e2e4", "c7c5"]);
        let renderer = PromptRenderer::default();
        let template = "{full_observation}\n{past_up_to_five_moves}";
        let a = renderer.render(template, &PromptContext::from_state(&state)).unwrap();
        let b = renderer.render(template, &PromptContext::from_state(&state)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_escaped_braces_and_unknown_placeholders() {
        let context = PromptContext::from_state(&GameState::initial());

        let rendered = PromptRenderer::new(PlaceholderPolicy::Literal)
            .render("{{\"move\": \"{role}\"}} {unknown} { not a var }", &context)
            .unwrap();
        assert_eq!(rendered, "{\"move\": \"White\"} {unknown} { not a var }");

        // 转义优先于占位符，孤立的括号保持原样
        let rendered = PromptRenderer::default()
            .render("{{role}} {{{role}}} { } } {9x}", &context)
            .unwrap();
        assert_eq!(rendered, "{role} {White} { } } {9x}");

        let err = PromptRenderer::new(PlaceholderPolicy::Reject)
            .render("{role} {unknown}", &context)
            .unwrap_err();
        assert_eq!(err, RenderError::UnknownPlaceholder { name: "unknown".to_string() });
    }

    #[test]
    fn test_validate() {
        let strict = PromptRenderer::new(PlaceholderPolicy::Reject);
        assert!(strict.validate("{role} {board} {valid_moves}").is_ok());
        assert!(strict.validate("{rol}").is_err());
        assert!(PromptRenderer::default().validate("{rol}").is_ok());
    }

    #[test]
    fn test_format_valid_moves() {
        let moves = vec!["e2e4".to_string(), "d2d4".to_string()];
        assert_eq!(format_valid_moves(&moves), "[e2e4], [d2d4]");
        assert_eq!(format_valid_moves(&[]), "none");
    }

    #[test]
    fn test_corrective_notice() {
        let notice = PromptRenderer::corrective_notice(2, "Black", "no move found", "[e7e5]");
        assert!(notice.contains("Attempt 2 failed: no move found."));
        assert!(notice.contains("playing as Black"));
        assert!(notice.contains("[e7e5]"));
        assert!(notice.contains("[UCI_MOVE]"));
    }
}
