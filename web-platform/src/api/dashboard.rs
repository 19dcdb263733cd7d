use actix_web::{get, web, HttpResponse};

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Mitra</title>
<style>
body { font-family: sans-serif; margin: 1em; }
.feeds img { width: 48%; margin-right: 1%; }
#events { height: 12em; overflow-y: auto; background: #f4f4f4; padding: .5em; }
</style>
</head>
<body>
<h2>Mitra</h2>
<div class="feeds">
  <img src="/video_feed_stream" alt="front camera">
  <img src="/lane_feed_stream" alt="lane camera">
</div>
<h3>Detections</h3>
<pre id="detections">[]</pre>
<h3>Lane</h3>
<pre id="lane">{}</pre>
<h3>Events</h3>
<pre id="events"></pre>
<input id="query" placeholder="Ask the assistant" size="40">
<button id="ask">Ask</button>
<pre id="reply"></pre>
<script>
const $ = (id) => document.getElementById(id);
new EventSource("/api/events").onmessage = (e) => {
  $("events").textContent = e.data + "\n" + $("events").textContent;
};
async function poll() {
  try {
    $("detections").textContent = JSON.stringify(await (await fetch("/api/latest_detections")).json());
    $("lane").textContent = JSON.stringify(await (await fetch("/api/lane_state")).json());
  } catch (e) {}
}
setInterval(poll, 1000);
$("ask").onclick = async () => {
  const r = await fetch("/api/speak", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ query: $("query").value, detections: [], status: {} }),
  });
  $("reply").textContent = (await r.json()).reply;
};
</script>
</body>
</html>
"#;

#[get("/")]
async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(DASHBOARD_HTML)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index);
}
