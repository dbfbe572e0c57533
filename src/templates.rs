use crate::models::CardTemplate;

const DASHED_RULE: &str =
    r#"<hr style="height:1px;border:none;border-top:1px dashed #0066CC;background-color:#ffffff;">"#;

const QUESTION_FORMAT: &str = r#"
<table>
    <tr>
        <td><h1 class="term">{{term}}</h1><br><div> 英 [{{BrEPhonetic}}] 美 [{{AmEPhonetic}}]</div></td>
        <td><img {{image}} height="120px"></td>
    </tr>
</table>
<hr>
释义：
<div>Tap to View</div>
{{#phraseFront}}
    __RULE__
    短语：
    <ul class='phrase'>{{phraseFront}}</ul>
{{/phraseFront}}
{{#sentenceFront}}
    __RULE__
    例句：
    <ol>{{sentenceFront}}</ol>
{{/sentenceFront}}
{{#BrEPron}}{{BrEPron}}{{/BrEPron}}
{{#AmEPron}}{{AmEPron}}{{/AmEPron}}
"#;

const ANSWER_FORMAT: &str = r#"
<table>
    <tr>
        <td><h1 class="term">{{term}}</h1><br><div> 英 [{{BrEPhonetic}}] 美 [{{AmEPhonetic}}]</div></td>
        <td><img {{image}} height="120px"></td>
    </tr>
</table>
<hr>
释义：
<div class='definition'>{{definition}}</div>
{{#phraseBack}}
    __RULE__
    短语：
    <ul class='phrase'>{{phraseBack}}</ul>
{{/phraseBack}}
{{#sentenceBack}}
    __RULE__
    例句：
    <ol class='sentence'>{{sentenceBack}}</ol>
{{/sentenceBack}}
"#;

pub const CARD_CSS: &str = r#"
.card {
    font-family: arial;
    font-size: 16px;
    text-align: left;
    color: black;
    background-color: white;
}
.term {
    font-size: 35px;
}
.answer {
    color: green;
}
.key {
    color: red;
}
"#;

/// 生成固定的卡片类型
pub fn card_template(name: &str) -> CardTemplate {
    CardTemplate {
        name: name.to_string(),
        qfmt: QUESTION_FORMAT.replace("__RULE__", DASHED_RULE),
        afmt: ANSWER_FORMAT.replace("__RULE__", DASHED_RULE),
    }
}

// 正面只显示原文
pub fn front_list(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(foreign, _)| format!("<li>{}</li>", foreign.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

// 背面附带译文
pub fn back_list(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(foreign, translation)| {
            format!(
                r#"<li>{}<br/><span class="answer">{}</span></li>"#,
                foreign.trim(),
                translation.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn definition_html(lines: &[String]) -> String {
    lines.join("<br/>")
}

pub fn image_src(url: &str) -> String {
    format!(r#"src="{}""#, url)
}

/// 发音文件名，下载器与笔记字段共用这一约定
///
/// term 中的路径分隔符、文件系统保留字符和会截断 `[sound:...]` 的 `]` 都换成 `_`，
/// 保证文件名始终是媒体目录下的单个文件。
pub fn media_file_name(field: &str, term: &str) -> String {
    let safe_term: String = term
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '[' | ']' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}_{}.mp3", field, safe_term)
}

pub fn sound_tag(field: &str, term: &str) -> String {
    format!("[sound:{}]", media_file_name(field, term))
}
