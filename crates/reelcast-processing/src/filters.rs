//! Encoder command construction for every pipeline stage.
//!
//! These are pure functions from stage configuration to [`FfmpegCommand`]; nothing here
//! touches the filesystem or spawns processes.

use reelcast_core::models::{
    BackgroundMusicConfig, BrandingConfig, ClipConfig, CompositionConfig, Position, RateControl,
    TextOverlay,
};
use reelcast_core::QualityLevel;
use std::path::Path;

use crate::command::FfmpegCommand;
use crate::error::StageCause;

const EDGE_MARGIN: u32 = 20;
const INTERMEDIATE_CRF: &str = "18";
const AUDIO_BITRATE: &str = "128k";
const DEFAULT_LOGO_WIDTH: u32 = 200;
const WATERMARK_FONT_SIZE: u32 = 24;

fn is_x26x(codec: &str) -> bool {
    matches!(codec, "libx264" | "libx265")
}

fn is_vpx(codec: &str) -> bool {
    matches!(codec, "libvpx" | "libvpx-vp9")
}

fn even(value: u32) -> u32 {
    (value / 2 * 2).max(2)
}

/// Escape text for a drawtext `text=` value.
pub fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '\'' | ':' | '%' | ',' | ';' | '[' | ']' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `x`/`y` expressions placing an inner box of size (`iw`, `ih`) inside (`ow`, `oh`).
fn position_xy(position: Position, ow: &str, oh: &str, iw: &str, ih: &str) -> (String, String) {
    let m = EDGE_MARGIN;
    let left = m.to_string();
    let top = m.to_string();
    let right = format!("{ow}-{iw}-{m}");
    let bottom = format!("{oh}-{ih}-{m}");
    let center_x = format!("({ow}-{iw})/2");
    let center_y = format!("({oh}-{ih})/2");

    match position {
        Position::TopLeft => (left, top),
        Position::TopCenter => (center_x, top),
        Position::TopRight => (right, top),
        Position::Center => (center_x, center_y),
        Position::BottomLeft => (left, bottom),
        Position::BottomCenter => (center_x, bottom),
        Position::BottomRight => (right, bottom),
    }
}

fn overlay_position(position: Position) -> String {
    let (x, y) = position_xy(position, "W", "H", "w", "h");
    format!("{}:{}", x, y)
}

fn drawtext_position(position: Position) -> String {
    let (x, y) = position_xy(position, "w", "h", "tw", "th");
    format!("x={}:y={}", x, y)
}

/// Speed/quality arguments for intermediate encodes.
fn intermediate_video_args(config: &CompositionConfig) -> Vec<String> {
    let codec = config.video_codec();
    let mut args = vec!["-c:v".to_string(), codec.to_string()];
    if is_x26x(codec) {
        args.extend(["-preset".to_string(), config.preset().to_string()]);
        args.extend(["-crf".to_string(), INTERMEDIATE_CRF.to_string()]);
    } else if is_vpx(codec) {
        args.extend(["-crf".to_string(), INTERMEDIATE_CRF.to_string()]);
        args.extend(["-b:v".to_string(), "0".to_string()]);
    }
    args
}

fn scale_pad_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = width,
        h = height
    )
}

fn faststart_args(format: &str) -> Vec<String> {
    if matches!(format, "mp4" | "mov") {
        vec!["-movflags".to_string(), "+faststart".to_string()]
    } else {
        Vec::new()
    }
}

/// Mux recording video with voiceover audio, cut to the shorter stream.
pub fn merge_command(
    recording: &Path,
    voiceover: &Path,
    config: &CompositionConfig,
    output: &Path,
) -> FfmpegCommand {
    FfmpegCommand::new("merge", output)
        .input(recording)
        .input(voiceover)
        .args(["-map", "0:v:0", "-map", "1:a:0"])
        .args(intermediate_video_args(config))
        .args(["-c:a", config.audio_codec(), "-shortest"])
}

/// Logo overlay and/or watermark text. `video_width` sizes the logo.
pub fn branding_command(
    input: &Path,
    branding: &BrandingConfig,
    video_width: Option<u32>,
    config: &CompositionConfig,
    output: &Path,
) -> FfmpegCommand {
    let mut command = FfmpegCommand::new("branding", output).input(input);
    let mut graph: Vec<String> = Vec::new();
    let mut last = "0:v".to_string();

    if let Some(logo) = &branding.logo_path {
        command = command.input(logo);
        let logo_width = video_width
            .map(|w| even((w as f32 * branding.logo_scale).round() as u32))
            .unwrap_or(DEFAULT_LOGO_WIDTH);
        graph.push(format!(
            "[1:v]format=rgba,scale={}:-1,colorchannelmixer=aa={:.2}[logo]",
            logo_width, branding.logo_opacity
        ));
        graph.push(format!(
            "[{}][logo]overlay={}[branded]",
            last,
            overlay_position(branding.logo_position)
        ));
        last = "branded".to_string();
    }

    if let Some(text) = &branding.watermark_text {
        // Watermark sits opposite the logo so they never overlap.
        let position = match branding.logo_position {
            Position::BottomRight => Position::BottomLeft,
            _ => Position::BottomRight,
        };
        graph.push(format!(
            "[{}]drawtext=text={}:fontsize={}:fontcolor=white@{:.2}:{}[marked]",
            last,
            escape_drawtext(text),
            WATERMARK_FONT_SIZE,
            branding.logo_opacity.clamp(0.3, 0.8),
            drawtext_position(position)
        ));
        last = "marked".to_string();
    }

    command
        .args(["-filter_complex".to_string(), graph.join(";")])
        .args(["-map".to_string(), format!("[{}]", last)])
        .args(["-map", "0:a?"])
        .args(intermediate_video_args(config))
        .args(["-c:a", "copy"])
}

/// Burn one timed text overlay.
pub fn text_overlay_command(
    input: &Path,
    overlay: &TextOverlay,
    config: &CompositionConfig,
    output: &Path,
) -> FfmpegCommand {
    let mut drawtext = format!(
        "drawtext=text={}:fontsize={}:fontcolor={}:{}:enable='between(t,{:.3},{:.3})'",
        escape_drawtext(&overlay.text),
        overlay.font_size,
        overlay.font_color,
        drawtext_position(overlay.position),
        overlay.start_time,
        overlay.end_time
    );
    if let Some(background) = &overlay.background_color {
        drawtext.push_str(&format!(":box=1:boxcolor={}:boxborderw=10", background));
    }

    FfmpegCommand::new("text_overlay", output)
        .input(input)
        .args(["-vf".to_string(), drawtext])
        .args(intermediate_video_args(config))
        .args(["-c:a", "copy"])
}

/// Mix looping background music under the existing audio track.
pub fn music_command(
    input: &Path,
    music: &BackgroundMusicConfig,
    video_duration: f64,
    config: &CompositionConfig,
    output: &Path,
) -> FfmpegCommand {
    let mut chain = vec![format!("volume={:.3}", music.volume)];
    if music.fade_in > 0.0 {
        chain.push(format!("afade=t=in:st=0:d={:.3}", music.fade_in));
    }
    if music.fade_out > 0.0 && video_duration > music.fade_out {
        chain.push(format!(
            "afade=t=out:st={:.3}:d={:.3}",
            video_duration - music.fade_out,
            music.fade_out
        ));
    }
    let graph = format!(
        "[1:a]{}[bg];[0:a][bg]amix=inputs=2:duration=first:dropout_transition=0[aout]",
        chain.join(",")
    );

    FfmpegCommand::new("background_music", output)
        .input(input)
        .args(["-stream_loop", "-1"])
        .input(&music.path)
        .args(["-filter_complex".to_string(), graph])
        .args(["-map", "0:v", "-map", "[aout]", "-c:v", "copy"])
        .args(["-c:a", config.audio_codec()])
        .with_expected_duration(video_duration)
}

/// Generate an intro or outro clip matching the main video's frame size and rate.
pub fn clip_command(
    operation: &'static str,
    clip: &ClipConfig,
    width: u32,
    height: u32,
    fps: f64,
    config: &CompositionConfig,
    output: &Path,
) -> Result<FfmpegCommand, StageCause> {
    let template = clip.template.trim().to_lowercase();
    let fade = (clip.duration / 4.0).min(1.0);
    let font_size = match template.as_str() {
        "minimal" | "fade" => (height / 14).max(16),
        "title_card" => (height / 9).max(24),
        _ => return Err(StageCause::UnknownTemplate(clip.template.clone())),
    };

    let mut chain: Vec<String> = Vec::new();
    if let Some(text) = &clip.text {
        let mut drawtext = format!(
            "drawtext=text={}:fontsize={}:fontcolor=white:{}",
            escape_drawtext(text),
            font_size,
            drawtext_position(Position::Center)
        );
        if template == "title_card" {
            drawtext.push_str(":box=1:boxcolor=black@0.4:boxborderw=24");
        }
        chain.push(drawtext);
    }
    if template == "fade" || template == "title_card" {
        chain.push(format!("fade=t=in:st=0:d={:.3}", fade));
    }
    if template == "fade" {
        chain.push(format!(
            "fade=t=out:st={:.3}:d={:.3}",
            clip.duration - fade,
            fade
        ));
    }
    if chain.is_empty() {
        chain.push("null".to_string());
    }

    let mut command = FfmpegCommand::new(operation, output)
        .lavfi_input(format!(
            "color=c={}:s={}x{}:d={:.3}:r={:.3}",
            clip.background_color, width, height, clip.duration, fps
        ))
        .lavfi_input("anullsrc=channel_layout=stereo:sample_rate=48000");

    let graph = match &clip.logo_path {
        Some(logo) => {
            command = command.input(logo);
            format!(
                "[2:v]scale={}:-1[logo];[0:v][logo]overlay=(W-w)/2:(H-h)/4[base];[base]{}[v]",
                even(width / 5),
                chain.join(",")
            )
        }
        None => format!("[0:v]{}[v]", chain.join(",")),
    };

    Ok(command
        .args(["-filter_complex".to_string(), graph])
        .args(["-map", "[v]", "-map", "1:a"])
        .args(["-t".to_string(), format!("{:.3}", clip.duration)])
        .args(intermediate_video_args(config))
        .args(["-pix_fmt", "yuv420p", "-c:a", config.audio_codec()]))
}

/// Concatenate segments (video + audio) after normalising size, SAR and frame rate.
pub fn concat_command(
    segments: &[&Path],
    width: u32,
    height: u32,
    fps: f64,
    config: &CompositionConfig,
    output: &Path,
) -> FfmpegCommand {
    let mut command = FfmpegCommand::new("concat", output);
    let mut graph: Vec<String> = Vec::new();
    let mut pads = String::new();

    for (i, segment) in segments.iter().enumerate() {
        command = command.input(segment);
        graph.push(format!(
            "[{i}:v]{},fps={fps:.3}[v{i}]",
            scale_pad_filter(width, height)
        ));
        graph.push(format!(
            "[{i}:a]aresample=48000,aformat=channel_layouts=stereo[a{i}]"
        ));
        pads.push_str(&format!("[v{i}][a{i}]"));
    }
    graph.push(format!("{}concat=n={}:v=1:a=1[v][a]", pads, segments.len()));

    command
        .args(["-filter_complex".to_string(), graph.join(";")])
        .args(["-map", "[v]", "-map", "[a]"])
        .args(intermediate_video_args(config))
        .args(["-c:a", config.audio_codec()])
}

/// Rate-control arguments for the configured mode.
fn rate_control_args(config: &CompositionConfig) -> Vec<String> {
    match config.rate_control() {
        RateControl::Crf { value } => {
            let mut args = vec!["-crf".to_string(), value.to_string()];
            if is_vpx(config.video_codec()) {
                args.extend(["-b:v".to_string(), "0".to_string()]);
            }
            args
        }
        RateControl::Bitrate { kbps } => vec![
            "-b:v".to_string(),
            format!("{}k", kbps),
            "-maxrate".to_string(),
            format!("{}k", kbps),
            "-bufsize".to_string(),
            format!("{}k", kbps * 2),
        ],
    }
}

/// Final master encode with the caller's container, codecs and rate control.
pub fn final_encode_command(
    input: &Path,
    config: &CompositionConfig,
    expected_duration: Option<f64>,
    output: &Path,
) -> FfmpegCommand {
    let mut command = FfmpegCommand::new("final_encode", output)
        .input(input)
        .args(["-c:v", config.video_codec()]);
    if is_x26x(config.video_codec()) {
        command = command.args(["-preset", config.preset()]);
    }
    command = command.args(rate_control_args(config));
    if let Some(resolution) = config.resolution() {
        command = command.args([
            "-vf".to_string(),
            scale_pad_filter(resolution.width, resolution.height),
        ]);
    }
    if let Some(fps) = config.fps() {
        command = command.args(["-r".to_string(), format!("{}", fps)]);
    }
    command = command
        .args(["-pix_fmt", "yuv420p", "-c:a", config.audio_codec(), "-b:a", AUDIO_BITRATE])
        .args(faststart_args(config.format()));
    match expected_duration {
        Some(duration) => command.with_expected_duration(duration),
        None => command,
    }
}

/// One quality-ladder rendition of the master.
pub fn rendition_command(
    master: &Path,
    level: &QualityLevel,
    config: &CompositionConfig,
    output: &Path,
) -> FfmpegCommand {
    let kbps = level.bitrate_kbps;
    let mut command = FfmpegCommand::new("rendition", output)
        .input(master)
        .args([
            "-vf".to_string(),
            scale_pad_filter(level.width, level.height),
        ])
        .args(["-c:v", config.video_codec()]);
    if is_x26x(config.video_codec()) {
        command = command.args(["-preset", config.preset()]);
    }
    command
        .args([
            "-b:v".to_string(),
            format!("{}k", kbps),
            "-maxrate".to_string(),
            format!("{}k", kbps * 107 / 100),
            "-bufsize".to_string(),
            format!("{}k", kbps * 2),
        ])
        .args(["-pix_fmt", "yuv420p", "-c:a", config.audio_codec(), "-b:a", AUDIO_BITRATE])
        .args(faststart_args(config.format()))
}

/// Single JPEG frame at `timestamp`, scaled to `width` with the aspect ratio kept.
pub fn thumbnail_command(video: &Path, timestamp: f64, width: u32, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new("thumbnail", output)
        .args(["-ss".to_string(), format!("{:.3}", timestamp)])
        .input(video)
        .args([
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:-2", width),
            "-q:v".to_string(),
            "2".to_string(),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcast_core::models::CompositionConfigInput;
    use reelcast_core::quality_level;
    use std::path::PathBuf;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_merge_truncates_to_shortest() {
        let cmd = merge_command(
            &p("rec.mp4"),
            &p("vo.mp3"),
            &CompositionConfig::default(),
            &p("merged.mkv"),
        );
        assert!(cmd.has_flag("-shortest"));
        assert_eq!(cmd.inputs(), &[p("rec.mp4"), p("vo.mp3")]);
        assert_eq!(cmd.value_of("-c:a"), Some("aac"));
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("Hi: it's 50%"), "Hi\\: it\\'s 50\\%");
    }

    #[test]
    fn test_branding_with_logo_and_watermark() {
        let branding = BrandingConfig {
            logo_path: Some(p("logo.png")),
            logo_position: Position::TopRight,
            logo_opacity: 0.5,
            logo_scale: 0.1,
            watermark_text: Some("ACME".to_string()),
        };
        let cmd = branding_command(
            &p("in.mkv"),
            &branding,
            Some(1920),
            &CompositionConfig::default(),
            &p("out.mkv"),
        );
        let graph = cmd.value_of("-filter_complex").unwrap();
        assert!(graph.contains("scale=192:-1"));
        assert!(graph.contains("colorchannelmixer=aa=0.50"));
        assert!(graph.contains("overlay=W-w-20:20"));
        assert!(graph.contains("drawtext=text=ACME"));
        assert_eq!(cmd.value_of("-map"), Some("[marked]"));
    }

    #[test]
    fn test_branding_watermark_only_has_single_input() {
        let branding = BrandingConfig {
            logo_path: None,
            logo_position: Position::BottomRight,
            logo_opacity: 1.0,
            logo_scale: 0.15,
            watermark_text: Some("Draft".to_string()),
        };
        let cmd = branding_command(
            &p("in.mkv"),
            &branding,
            None,
            &CompositionConfig::default(),
            &p("out.mkv"),
        );
        assert_eq!(cmd.inputs().len(), 1);
        assert!(cmd.value_of("-filter_complex").unwrap().starts_with("[0:v]drawtext"));
    }

    #[test]
    fn test_text_overlay_window_and_box() {
        let overlay = TextOverlay {
            text: "Step 1".to_string(),
            start_time: 1.5,
            end_time: 4.0,
            position: Position::BottomCenter,
            font_size: 32,
            font_color: "yellow".to_string(),
            background_color: Some("black@0.5".to_string()),
        };
        let cmd = text_overlay_command(
            &p("in.mkv"),
            &overlay,
            &CompositionConfig::default(),
            &p("out.mkv"),
        );
        let vf = cmd.value_of("-vf").unwrap();
        assert!(vf.contains("enable='between(t,1.500,4.000)'"));
        assert!(vf.contains("boxcolor=black@0.5"));
        assert!(vf.contains("x=(w-tw)/2:y=h-th-20"));
    }

    #[test]
    fn test_music_fades() {
        let music = BackgroundMusicConfig {
            path: p("bed.mp3"),
            volume: 0.2,
            fade_in: 2.0,
            fade_out: 3.0,
        };
        let cmd = music_command(
            &p("in.mkv"),
            &music,
            30.0,
            &CompositionConfig::default(),
            &p("out.mkv"),
        );
        let graph = cmd.value_of("-filter_complex").unwrap();
        assert!(graph.contains("volume=0.200"));
        assert!(graph.contains("afade=t=in:st=0:d=2.000"));
        assert!(graph.contains("afade=t=out:st=27.000:d=3.000"));
        assert_eq!(cmd.value_of("-stream_loop"), Some("-1"));
    }

    #[test]
    fn test_clip_templates() {
        let mut clip = ClipConfig {
            duration: 3.0,
            template: "fade".to_string(),
            background_color: "navy".to_string(),
            text: Some("Welcome".to_string()),
            logo_path: None,
        };
        let config = CompositionConfig::default();
        let cmd = clip_command("intro", &clip, 1280, 720, 30.0, &config, &p("intro.mkv")).unwrap();
        let graph = cmd.value_of("-filter_complex").unwrap();
        assert!(graph.contains("fade=t=out:st=2.250:d=0.750"));
        assert_eq!(cmd.value_of("-t"), Some("3.000"));

        clip.template = "sparkles".to_string();
        assert!(matches!(
            clip_command("intro", &clip, 1280, 720, 30.0, &config, &p("intro.mkv")),
            Err(StageCause::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_concat_three_segments() {
        let intro = p("intro.mkv");
        let main = p("main.mkv");
        let outro = p("outro.mkv");
        let cmd = concat_command(
            &[&intro, &main, &outro],
            1280,
            720,
            30.0,
            &CompositionConfig::default(),
            &p("out.mkv"),
        );
        assert_eq!(cmd.inputs().len(), 3);
        assert!(cmd
            .value_of("-filter_complex")
            .unwrap()
            .ends_with("[v0][a0][v1][a1][v2][a2]concat=n=3:v=1:a=1[v][a]"));
    }

    #[test]
    fn test_final_encode_rate_control() {
        let crf = CompositionConfig::default();
        let cmd = final_encode_command(&p("in.mkv"), &crf, Some(42.0), &p("out.mp4"));
        assert_eq!(cmd.value_of("-crf"), Some("23"));
        assert!(!cmd.has_flag("-b:v"));
        assert_eq!(cmd.value_of("-movflags"), Some("+faststart"));
        assert_eq!(cmd.expected_duration(), Some(42.0));

        let bitrate = CompositionConfigInput {
            format: "webm".to_string(),
            video_codec: "libvpx-vp9".to_string(),
            audio_codec: "libopus".to_string(),
            video_bitrate_kbps: Some(2000),
            resolution: Some("1280x720".parse().unwrap()),
            fps: Some(30.0),
            ..Default::default()
        }
        .build()
        .unwrap();
        let cmd = final_encode_command(&p("in.mkv"), &bitrate, None, &p("out.webm"));
        assert_eq!(cmd.value_of("-b:v"), Some("2000k"));
        assert!(!cmd.has_flag("-crf"));
        assert!(!cmd.has_flag("-preset"));
        assert!(!cmd.has_flag("-movflags"));
        assert!(cmd.value_of("-vf").unwrap().starts_with("scale=1280:720"));
        assert_eq!(cmd.value_of("-r"), Some("30"));
    }

    #[test]
    fn test_rendition_uses_ladder_entry() {
        let level = quality_level("480p").unwrap();
        let cmd = rendition_command(
            &p("master.mp4"),
            level,
            &CompositionConfig::default(),
            &p("master_480p.mp4"),
        );
        assert!(cmd.value_of("-vf").unwrap().starts_with("scale=854:480"));
        assert_eq!(cmd.value_of("-b:v"), Some("1500k"));
    }

    #[test]
    fn test_thumbnail_seeks_before_input() {
        let cmd = thumbnail_command(&p("master.mp4"), 5.0, 640, &p("thumb.jpg"));
        assert_eq!(cmd.arguments()[0], "-ss");
        assert_eq!(cmd.value_of("-ss"), Some("5.000"));
        assert_eq!(cmd.value_of("-vf"), Some("scale=640:-2"));
    }
}
