/// ピッチクラスごとの既定の綴り（フラットは `-` で表記）
const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "E-", "E", "F", "F#", "G", "G#", "A", "B-", "B",
];

/// オクターブ省略時の既定値
const DEFAULT_OCTAVE: i32 = 4;

/// MIDIノート番号を音名に変換（C4 = 60）
pub fn pitch_name(midi: u8) -> String {
    let octave = midi as i32 / 12 - 1;
    format!("{}{}", PITCH_NAMES[(midi % 12) as usize], octave)
}

/// 音名をMIDIノート番号に変換
///
/// 形式: 音名 + 臨時記号（`#` / `-` / `b`、複数可）+ オクターブ（省略時4）。
/// `-` は常にフラットとして読む。オクターブ-1の音名（`C-1` など）は
/// フラット付きのオクターブ1として読まれ、別の音高になる。
pub fn parse_pitch_name(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars().peekable();

    let step = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    // 臨時記号
    let mut alter = 0i32;
    while let Some(&c) = chars.peek() {
        match c {
            '#' => alter += 1,
            '-' | 'b' => alter -= 1,
            _ => break,
        }
        chars.next();
    }

    // オクターブ
    let rest: String = chars.collect();
    let octave = if rest.is_empty() {
        DEFAULT_OCTAVE
    } else if rest.chars().all(|c| c.is_ascii_digit()) {
        rest.parse::<i32>().ok().filter(|&o| o <= 10)?
    } else {
        return None;
    };

    let midi = (octave + 1) * 12 + step + alter;
    u8::try_from(midi).ok().filter(|&m| m <= 127)
}

/// ピッチクラス集合の正規形（Rahn方式）
///
/// 最もコンパクトな回転を選び、同幅なら右端から詰まっている方、
/// それでも同じなら先頭のピッチクラスが小さい方を採用する。
pub fn normal_order(pitch_classes: &[u8]) -> Vec<u8> {
    let mut pcs: Vec<u8> = pitch_classes.iter().map(|p| p % 12).collect();
    pcs.sort_unstable();
    pcs.dedup();

    if pcs.len() <= 1 {
        return pcs;
    }

    let n = pcs.len();
    let mut best: Option<(Vec<u8>, Vec<u8>)> = None;

    for start in 0..n {
        // 回転: 折り返した要素には12を足して単調増加にする
        let rotation: Vec<u8> = (0..n)
            .map(|i| {
                let idx = start + i;
                if idx < n {
                    pcs[idx]
                } else {
                    pcs[idx - n] + 12
                }
            })
            .collect();

        // 比較キー: 末尾から先頭へ、先頭との音程幅
        let key: Vec<u8> = (1..n).rev().map(|i| rotation[i] - rotation[0]).collect();

        let better = match &best {
            Some((best_key, _)) => key < *best_key,
            None => true,
        };
        if better {
            best = Some((key, rotation));
        }
    }

    best.map(|(_, rotation)| rotation.into_iter().map(|p| p % 12).collect())
        .unwrap_or_default()
}

/// 正規形をトークン文字列に変換（例: "0.4.7"）
pub fn chord_token(pitch_classes: &[u8]) -> String {
    normal_order(pitch_classes)
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
