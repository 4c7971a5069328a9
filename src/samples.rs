use crate::style::Style;

const ANIME: &str = "\
Kaito is a wandering swordsman with silver hair tied back, narrow crimson eyes and a diagonal scar \
across his left cheek. He wears a frayed black haori lined with red and carries a katana whose hilt \
is worn smooth.

In a mountain shrine abandoned for decades he finds Yuki, a quiet girl with long white hair that \
glows faintly in the dark and wide violet eyes. Her plain white kimono is printed with blue waves.

They cross fields of cherry blossoms at sunset, drive off bandits in a village drowning in night \
rain, wait out a thunderstorm in a cave, and at dawn reach a great waterfall where Yuki shows Kaito \
that she is a spirit of the river.";

const REALISTIC: &str = "\
Detective Maya Chen is in her mid-thirties, with cropped black hair, a cybernetic left eye that \
glows a soft blue and a scuffed leather jacket. She is working a homicide in Neo Shanghai, 2087.

Her prime suspect is ARIA, an android with porcelain-white synthetic skin, fine silver lines \
tracing her cheekbones and unsettlingly human green eyes. ARIA wears a tailored white coat with \
holographic piping.

The case leads through crowded neon alleys full of street vendors, a spotless corporate tower \
walled with glass, a grimy underground market under flickering signs, and ends in a standoff on a \
rain-lashed rooftop above the holographic skyline.";

const SCI_FI: &str = "\
Commander Elena Vance has short auburn hair, green eyes and a long scar from temple to jaw. She \
leads the last line of human defense in dented power armor stamped with the United Earth Fleet \
insignia.

Her unlikely ally is Krix, an alien warrior whose skin shifts between blue and purple, with four \
eyes set in a diamond and glowing markings that pulse with his mood. His armor looks grown rather \
than forged.

Together they fight down the burning corridors of an orbital station, hold a desperate line in a \
jungle of luminous plants, bargain before a vast alien council, and face the final battle on the \
bridge of an enormous warship.";

const FANTASY: &str = "\
Lyra is a young mage with long copper hair, one gold eye and one silver, and freckles scattered \
like constellations across her pale skin. She wears flowing blue robes stitched with silver and \
carries an ancient staff of dark wood.

Grimjaw travels with her, a grizzled dwarf with a braided gray beard, deep brown eyes and arms \
covered in interlocking tattoos. He wears battered plate armor and swings a massive war hammer.

Their road runs through an enchanted forest where the trees whisper, over a mountain pass in a \
blizzard, down into an old dwarven mine lit by glowing crystals, and up to a wizard's tower that \
floats among the clouds.";

/// Built-in example story for a style.
pub fn sample_story(style: Style) -> &'static str {
    match style {
        Style::Anime => ANIME,
        Style::Realistic => REALISTIC,
        Style::SciFi => SCI_FI,
        Style::Fantasy => FANTASY,
    }
}
