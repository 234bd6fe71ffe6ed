/// WebSocket endpoint for a server or share URL. An explicit room wins over
/// one found in a `/s/{room}` page path; without either the lobby is used.
pub fn websocket_url(server_url: &str, room_id: Option<&str>) -> String {
    let trimmed = server_url.trim();
    let (scheme, rest) = match trimmed.split_once("://") {
        Some(("https", rest)) | Some(("wss", rest)) => ("wss", rest),
        Some((_, rest)) => ("ws", rest),
        None => ("ws", trimmed),
    };
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    let room_id = room_id
        .map(str::to_string)
        .or_else(|| room_id_from_path(path));
    if let Some(room_id) = room_id {
        format!("{scheme}://{host}/ws/{room_id}")
    } else {
        format!("{scheme}://{host}/ws")
    }
}

fn room_id_from_path(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next()?;
    let mut parts = path.trim_matches('/').split('/');
    if parts.next()? != "s" {
        return None;
    }
    let room_id = parts.next()?;
    if room_id.is_empty() {
        None
    } else {
        Some(room_id.to_string())
    }
}
